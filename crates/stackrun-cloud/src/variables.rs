//! Template variables and their resolution
//!
//! A variable's runtime value is chosen in this order: explicit override,
//! autogeneration rule, declared `default`, declared `value`. A variable with
//! none of them is an error naming the variable.

use crate::error::{CamError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Local;
use ed25519_dalek::SigningKey;
use rand::Rng;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const PASSWORD_LENGTH: usize = 10;
pub const PASSWORD_SPECIAL_CHARS: &str = "!()-._~@#";

const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";

pub const DATACENTERS: [&str; 10] = [
    "dal05", "dal06", "dal09", "dal10", "hou02", "mon01", "sea01", "tor01", "wdc01", "wdc04",
];

const ACCOUNT_ID: &str = "1160447";

/// Declaration of one template variable
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autogenerate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Declared variables by name
pub type Variables = BTreeMap<String, VariableDecl>;

/// Explicit values that win over every declaration
pub type Overrides = BTreeMap<String, Value>;

/// Parse a variable file
///
/// Accepts `{"variable": {...}}` or the bare name → declaration map.
pub fn parse_variables(content: &str) -> Result<Variables> {
    let mut root: Value = serde_json::from_str(content)?;
    let declarations = match root.get_mut("variable") {
        Some(inner) if inner.is_object() => inner.take(),
        _ => root,
    };
    serde_json::from_value(declarations)
        .map_err(|e| CamError::Variable(format!("Invalid variable declarations: {}", e)))
}

/// Load and merge variable files; later files overwrite earlier ones
pub fn load_variable_files<P: AsRef<Path>>(paths: &[P]) -> Result<Variables> {
    let mut variables = Variables::new();
    for path in paths {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let parsed = parse_variables(&content).map_err(|e| {
            CamError::Variable(format!("{}: {}", path.display(), e))
        })?;
        variables.extend(parsed);
    }
    Ok(variables)
}

/// Load an override file, a flat JSON object of name → value
pub fn load_overrides(path: &Path) -> Result<Overrides> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| CamError::Variable(format!("{}: {}", path.display(), e)))
}

/// Autogeneration rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutogenKind {
    SshKey,
    Hostname,
    SshKeyName,
    Datacenter,
    Account,
    Password,
    VpcName,
}

impl FromStr for AutogenKind {
    type Err = CamError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sshkey" => Ok(AutogenKind::SshKey),
            "hostname" => Ok(AutogenKind::Hostname),
            "sshkeyname" => Ok(AutogenKind::SshKeyName),
            "datacenter" => Ok(AutogenKind::Datacenter),
            "acct" => Ok(AutogenKind::Account),
            "password" => Ok(AutogenKind::Password),
            "vpcname" => Ok(AutogenKind::VpcName),
            other => Err(CamError::Variable(format!(
                "Invalid autogenerate type {}",
                other
            ))),
        }
    }
}

impl fmt::Display for AutogenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AutogenKind::SshKey => "sshkey",
            AutogenKind::Hostname => "hostname",
            AutogenKind::SshKeyName => "sshkeyname",
            AutogenKind::Datacenter => "datacenter",
            AutogenKind::Account => "acct",
            AutogenKind::Password => "password",
            AutogenKind::VpcName => "vpcname",
        };
        write!(f, "{}", name)
    }
}

impl AutogenKind {
    pub fn generate(self) -> String {
        match self {
            AutogenKind::SshKey => generate_ssh_public_key("stackrun"),
            AutogenKind::Hostname => format!("camcontent-{}", timestamp_suffix()),
            AutogenKind::SshKeyName => format!("testkey{}", timestamp_suffix()),
            AutogenKind::Datacenter => DATACENTERS
                .choose(&mut OsRng)
                .copied()
                .unwrap_or(DATACENTERS[0])
                .to_string(),
            AutogenKind::Account => ACCOUNT_ID.to_string(),
            AutogenKind::Password => generate_password(),
            AutogenKind::VpcName => format!("starterpack{}", timestamp_suffix()),
        }
    }
}

/// `HHMMSS` followed by microseconds
fn timestamp_suffix() -> String {
    Local::now().format("%H%M%S%6f").to_string()
}

/// Generate a password of [`PASSWORD_LENGTH`] characters with at least one
/// lowercase letter, one uppercase letter, one digit and one character of
/// [`PASSWORD_SPECIAL_CHARS`]
pub fn generate_password() -> String {
    let alphabet: Vec<char> = [LOWER, UPPER, DIGITS, PASSWORD_SPECIAL_CHARS]
        .concat()
        .chars()
        .collect();
    let mut rng = OsRng;
    loop {
        let password: String = (0..PASSWORD_LENGTH)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect();
        if is_complex_password(&password) {
            return password;
        }
    }
}

pub fn is_complex_password(password: &str) -> bool {
    password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c))
}

/// Fresh OpenSSH `ssh-ed25519` public key line
pub fn generate_ssh_public_key(comment: &str) -> String {
    let signing_key = SigningKey::generate(&mut OsRng);
    let public = signing_key.verifying_key().to_bytes();

    // RFC 4253 wire format: string "ssh-ed25519", string key
    let algorithm = b"ssh-ed25519";
    let mut blob = Vec::with_capacity(4 + algorithm.len() + 4 + public.len());
    blob.extend_from_slice(&(algorithm.len() as u32).to_be_bytes());
    blob.extend_from_slice(algorithm);
    blob.extend_from_slice(&(public.len() as u32).to_be_bytes());
    blob.extend_from_slice(&public);

    format!("ssh-ed25519 {} {}", STANDARD.encode(blob), comment)
}

/// Resolve the runtime value of `name`
pub fn resolve_value(name: &str, variables: &Variables, overrides: &Overrides) -> Result<Value> {
    if let Some(value) = overrides.get(name) {
        return Ok(value.clone());
    }
    let decl = variables.get(name).ok_or_else(|| {
        tracing::error!("Unable to find a value for variable: {}", name);
        CamError::Variable(format!("Unable to find a value for variable: {}", name))
    })?;
    if let Some(kind) = &decl.autogenerate {
        let kind: AutogenKind = kind.parse()?;
        return Ok(Value::String(kind.generate()));
    }
    decl.default
        .clone()
        .or_else(|| decl.value.clone())
        .ok_or_else(|| {
            tracing::error!("Unable to find a value for variable: {}", name);
            CamError::Variable(format!("Unable to find a value for variable: {}", name))
        })
}

/// The richer catalog-facing variable layer
///
/// Three shapes are understood: a bare list of entries, a catalog document
/// carrying `input_datatypes` (sent whole), and a content-runtime document
/// whose `template_input_params` list alone is sent.
#[derive(Debug, Clone, PartialEq)]
pub enum CamVariables {
    List(Vec<Map<String, Value>>),
    Catalog(Map<String, Value>),
    ContentRuntime(Vec<Map<String, Value>>),
}

const INPUT_PARAMS: &str = "template_input_params";

impl CamVariables {
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(entries) => Ok(CamVariables::List(entries_of(entries)?)),
            Value::Object(mut document) => {
                if document.contains_key("input_datatypes") {
                    if !matches!(document.get(INPUT_PARAMS), Some(Value::Array(_))) {
                        return Err(CamError::Variable(format!(
                            "CAM variables document has no '{}' list",
                            INPUT_PARAMS
                        )));
                    }
                    return Ok(CamVariables::Catalog(document));
                }
                match document.remove(INPUT_PARAMS) {
                    Some(Value::Array(entries)) => {
                        Ok(CamVariables::ContentRuntime(entries_of(entries)?))
                    }
                    _ => Err(CamError::Variable(format!(
                        "CAM variables document has no '{}' list",
                        INPUT_PARAMS
                    ))),
                }
            }
            other => Err(CamError::Variable(format!(
                "CAM variables must be a list or an object, got {}",
                other
            ))),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        Self::from_value(value)
    }

    /// Fill every entry lacking both `default` and `value` with the resolved
    /// value of the declared variable of the same name
    fn fill(self, variables: &Variables, overrides: &Overrides) -> Result<Value> {
        match self {
            CamVariables::List(entries) | CamVariables::ContentRuntime(entries) => {
                Ok(Value::Array(fill_entries(entries, variables, overrides)?))
            }
            CamVariables::Catalog(mut document) => {
                if let Some(params) = document.get_mut(INPUT_PARAMS) {
                    let entries = entries_of(match params.take() {
                        Value::Array(entries) => entries,
                        _ => Vec::new(),
                    })?;
                    *params = Value::Array(fill_entries(entries, variables, overrides)?);
                }
                Ok(Value::Object(document))
            }
        }
    }
}

fn entries_of(values: Vec<Value>) -> Result<Vec<Map<String, Value>>> {
    values
        .into_iter()
        .map(|value| match value {
            Value::Object(entry) => Ok(entry),
            other => Err(CamError::Variable(format!(
                "CAM variable entry must be an object: {}",
                other
            ))),
        })
        .collect()
}

fn fill_entries(
    entries: Vec<Map<String, Value>>,
    variables: &Variables,
    overrides: &Overrides,
) -> Result<Vec<Value>> {
    entries
        .into_iter()
        .map(|mut entry| {
            if !entry.contains_key("default") && !entry.contains_key("value") {
                let name = entry
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        CamError::Variable(format!(
                            "Missing 'name' in: {}",
                            Value::Object(entry.clone())
                        ))
                    })?
                    .to_string();
                entry.insert("value".to_string(), resolve_value(&name, variables, overrides)?);
            }
            Ok(Value::Object(entry))
        })
        .collect()
}

/// Build the `parameters` field of a stack creation request
///
/// Without CAM variables this is a map of every declared variable to its
/// resolved value; with them it is the filled CAM variable layer.
pub fn build_parameters(
    variables: &Variables,
    cam_variables: Option<CamVariables>,
    overrides: &Overrides,
) -> Result<Value> {
    match cam_variables {
        Some(cam_variables) => cam_variables.fill(variables, overrides),
        None => {
            let mut parameters = Map::new();
            for name in variables.keys() {
                parameters.insert(name.clone(), resolve_value(name, variables, overrides)?);
            }
            Ok(Value::Object(parameters))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decl(default: Option<Value>, value: Option<Value>, autogen: Option<&str>) -> VariableDecl {
        VariableDecl {
            default,
            value,
            autogenerate: autogen.map(str::to_string),
            description: None,
        }
    }

    #[test]
    fn test_value_passthrough() {
        let mut variables = Variables::new();
        for literal in [json!("us-east-1"), json!(""), json!(42), json!(["a", "b"])] {
            variables.insert("v".to_string(), decl(None, Some(literal.clone()), None));
            let resolved = resolve_value("v", &variables, &Overrides::new()).unwrap();
            assert_eq!(resolved, literal);
        }
    }

    #[test]
    fn test_resolution_priority() {
        let mut variables = Variables::new();
        variables.insert(
            "acct".to_string(),
            decl(Some(json!("d")), Some(json!("v")), Some("acct")),
        );
        variables.insert("region".to_string(), decl(Some(json!("d")), Some(json!("v")), None));

        let mut overrides = Overrides::new();
        assert_eq!(
            resolve_value("acct", &variables, &overrides).unwrap(),
            json!("1160447")
        );
        assert_eq!(
            resolve_value("region", &variables, &overrides).unwrap(),
            json!("d")
        );

        overrides.insert("acct".to_string(), json!("override"));
        assert_eq!(
            resolve_value("acct", &variables, &overrides).unwrap(),
            json!("override")
        );
    }

    #[test]
    fn test_missing_value_names_variable() {
        let mut variables = Variables::new();
        variables.insert("empty".to_string(), VariableDecl::default());
        let err = resolve_value("empty", &variables, &Overrides::new()).unwrap_err();
        assert!(err.to_string().contains("empty"));

        let err = resolve_value("undeclared", &variables, &Overrides::new()).unwrap_err();
        assert!(err.to_string().contains("undeclared"));
    }

    #[test]
    fn test_unknown_autogen_kind() {
        let mut variables = Variables::new();
        variables.insert("x".to_string(), decl(None, None, Some("uuid")));
        let err = resolve_value("x", &variables, &Overrides::new()).unwrap_err();
        assert!(err.to_string().contains("Invalid autogenerate type uuid"));
    }

    #[test]
    fn test_password_shape() {
        for _ in 0..200 {
            let password = generate_password();
            assert_eq!(password.chars().count(), PASSWORD_LENGTH);
            assert!(password.chars().any(|c| c.is_ascii_lowercase()));
            assert!(password.chars().any(|c| c.is_ascii_uppercase()));
            assert!(password.chars().any(|c| c.is_ascii_digit()));
            assert!(password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)));
            assert!(password.chars().all(|c| c.is_ascii_alphanumeric()
                || PASSWORD_SPECIAL_CHARS.contains(c)));
        }
    }

    #[test]
    fn test_autogen_names() {
        let hostname = AutogenKind::Hostname.generate();
        assert!(hostname.starts_with("camcontent-"));
        assert_eq!(hostname.len(), "camcontent-".len() + 12);

        assert!(AutogenKind::SshKeyName.generate().starts_with("testkey"));
        assert!(AutogenKind::VpcName.generate().starts_with("starterpack"));
        assert!(DATACENTERS.contains(&AutogenKind::Datacenter.generate().as_str()));
        assert_eq!(AutogenKind::Account.generate(), "1160447");
    }

    #[test]
    fn test_ssh_key_line() {
        let key = AutogenKind::SshKey.generate();
        let parts: Vec<&str> = key.split(' ').collect();
        assert_eq!(parts[0], "ssh-ed25519");
        let blob = STANDARD.decode(parts[1]).unwrap();
        // 4 + 11 + 4 + 32
        assert_eq!(blob.len(), 51);
        assert_eq!(&blob[4..15], b"ssh-ed25519");
    }

    #[test]
    fn test_parse_variables_both_shapes() {
        let wrapped = parse_variables(r#"{"variable": {"a": {"default": "x"}}}"#).unwrap();
        let bare = parse_variables(r#"{"a": {"default": "x"}}"#).unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(wrapped["a"].default, Some(json!("x")));
    }

    #[test]
    fn test_later_variable_files_win() {
        let temp_dir = tempfile::tempdir().unwrap();
        let first = temp_dir.path().join("a.json");
        let second = temp_dir.path().join("b.json");
        std::fs::write(&first, r#"{"variable": {"a": {"default": "1"}, "b": {"default": "1"}}}"#)
            .unwrap();
        std::fs::write(&second, r#"{"variable": {"b": {"default": "2"}}}"#).unwrap();

        let variables = load_variable_files(&[first, second]).unwrap();
        assert_eq!(variables["a"].default, Some(json!("1")));
        assert_eq!(variables["b"].default, Some(json!("2")));
    }

    #[test]
    fn test_build_parameters_without_cam_variables() {
        let mut variables = Variables::new();
        variables.insert("region".to_string(), decl(Some(json!("us-south")), None, None));
        variables.insert("acct".to_string(), decl(None, None, Some("acct")));

        let parameters = build_parameters(&variables, None, &Overrides::new()).unwrap();
        assert_eq!(parameters, json!({"acct": "1160447", "region": "us-south"}));
    }

    #[test]
    fn test_build_parameters_fills_cam_variables() {
        let mut variables = Variables::new();
        variables.insert("region".to_string(), decl(None, Some(json!("us-south")), None));

        let cam = CamVariables::from_value(json!([
            {"name": "region", "label": "Region"},
            {"name": "size", "default": "small"},
        ]))
        .unwrap();
        let parameters = build_parameters(&variables, Some(cam), &Overrides::new()).unwrap();
        assert_eq!(
            parameters,
            json!([
                {"name": "region", "label": "Region", "value": "us-south"},
                {"name": "size", "default": "small"},
            ])
        );
    }

    #[test]
    fn test_cam_variable_without_name_fails() {
        let cam = CamVariables::from_value(json!([{"label": "x"}])).unwrap();
        let err = build_parameters(&Variables::new(), Some(cam), &Overrides::new()).unwrap_err();
        assert!(err.to_string().contains("Missing 'name'"));
    }

    #[test]
    fn test_cam_variable_documents() {
        let mut variables = Variables::new();
        variables.insert("a".to_string(), decl(Some(json!("x")), None, None));

        let catalog = CamVariables::from_value(json!({
            "input_datatypes": [],
            "template_input_params": [{"name": "a"}],
        }))
        .unwrap();
        let filled = build_parameters(&variables, Some(catalog), &Overrides::new()).unwrap();
        assert_eq!(filled["input_datatypes"], json!([]));
        assert_eq!(filled["template_input_params"][0]["value"], "x");

        let runtime = CamVariables::from_value(json!({
            "output_datatype": "advanced_content_runtime_chef",
            "template_input_params": [{"name": "a"}],
        }))
        .unwrap();
        let filled = build_parameters(&variables, Some(runtime), &Overrides::new()).unwrap();
        assert_eq!(filled, json!([{"name": "a", "value": "x"}]));

        assert!(CamVariables::from_value(json!({"other": 1})).is_err());
    }
}
