//! Template probing
//!
//! Only two facts about a template matter here: its format and the name of
//! the first provider block, which selects the cloud connection.

use crate::api::TemplateFormat;
use crate::error::{CamError, Result};
use regex::Regex;
use serde_json::Value;
use std::path::Path;

/// A loaded infrastructure template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub content: String,
    pub format: TemplateFormat,
    pub provider: String,
}

impl Template {
    /// Probe `content`; a template is JSON only if it starts with `{`
    pub fn parse(content: impl Into<String>) -> Result<Self> {
        let content = content.into();
        let format = if content.trim_start().starts_with('{') {
            TemplateFormat::Json
        } else {
            TemplateFormat::Hcl
        };
        let provider = match format {
            TemplateFormat::Json => json_provider(&content)?,
            TemplateFormat::Hcl => hcl_provider(&content)?,
        };
        Ok(Self {
            content,
            format,
            provider,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(content).map_err(|e| match e {
            CamError::Template(msg) => CamError::Template(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }
}

fn json_provider(content: &str) -> Result<String> {
    let parsed: Value = serde_json::from_str(content)
        .map_err(|e| CamError::Template(format!("JSON template does not parse: {}", e)))?;
    let first_key = |block: &Value| {
        block
            .as_object()
            .and_then(|providers| providers.keys().next().cloned())
    };
    let provider = match parsed.get("provider") {
        Some(Value::Array(blocks)) => blocks.first().and_then(first_key),
        Some(block) => first_key(block),
        None => None,
    };
    provider.ok_or_else(|| CamError::Template("no provider block found".to_string()))
}

fn hcl_provider(content: &str) -> Result<String> {
    let provider_re = Regex::new(r#"(?m)^\s*provider\s+(?:"([^"]+)"|([A-Za-z0-9_-]+))\s*\{"#)
        .map_err(|e| CamError::Template(format!("provider pattern: {}", e)))?;
    provider_re
        .captures(content)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| CamError::Template("no provider block found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hcl_template() {
        let template = Template::parse(
            r#"
# comment
variable "region" {}

provider "aws" {
  region = "${var.region}"
}

provider "ibm" {}
"#,
        )
        .unwrap();
        assert_eq!(template.format, TemplateFormat::Hcl);
        assert_eq!(template.provider, "aws");
    }

    #[test]
    fn test_hcl_unquoted_provider() {
        let template = Template::parse("provider vsphere {\n}\n").unwrap();
        assert_eq!(template.provider, "vsphere");
    }

    #[test]
    fn test_json_template_keeps_key_order() {
        let template =
            Template::parse(r#"  {"provider": {"ibm": {}, "aws": {}}, "resource": {}}"#).unwrap();
        assert_eq!(template.format, TemplateFormat::Json);
        assert_eq!(template.provider, "ibm");

        let listed = Template::parse(r#"{"provider": [{"vsphere": {}}]}"#).unwrap();
        assert_eq!(listed.provider, "vsphere");
    }

    #[test]
    fn test_json_probe_is_syntactic() {
        // starts with `{` so it must be JSON, and is not
        let err = Template::parse("{ provider \"aws\" {} }").unwrap_err();
        assert!(matches!(err, CamError::Template(_)));
    }

    #[test]
    fn test_missing_provider() {
        assert!(Template::parse("resource \"null\" \"x\" {}").is_err());
        assert!(Template::parse(r#"{"resource": {}}"#).is_err());
    }
}
