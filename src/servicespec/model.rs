//! Service specification as served by the management API.
//!
//! Only the fields the translation engine reads are modelled; everything
//! else in the document is ignored during deserialization.

use serde::{Deserialize, Deserializer};

/// File type marking the compiled interface descriptor in `sourceInfo`.
pub const DESCRIPTOR_FILE_TYPE: &str = "FILE_DESCRIPTOR_SET_PROTO";

/// One fetched, immutable service specification.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceSpecification {
    /// Service name (e.g., "bookstore.endpoints.project123.cloud.goog").
    pub name: String,

    /// Config id of this revision, when the document carries one.
    pub id: Option<String>,

    pub apis: Vec<Api>,

    pub authentication: Authentication,

    pub http: Http,

    pub source_info: SourceInfo,

    pub control: Control,
}

impl ServiceSpecification {
    /// Usage reporting is on whenever a control environment is declared.
    pub fn usage_reporting_enabled(&self) -> bool {
        !self.control.environment.trim().is_empty()
    }

    /// The compiled interface descriptor file, if one is attached.
    pub fn descriptor_file(&self) -> Option<&SourceFile> {
        self.source_info
            .source_files
            .iter()
            .find(|f| f.file_type == DESCRIPTOR_FILE_TYPE)
    }

    /// Fully-qualified selectors of every declared method, in declaration order.
    pub fn method_selectors(&self) -> impl Iterator<Item = String> + '_ {
        self.apis
            .iter()
            .flat_map(|api| api.methods.iter().map(move |m| api.selector(&m.name)))
    }
}

/// One API (an RPC service) of the specification.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Api {
    /// Fully-qualified service name (e.g., "endpoints.examples.bookstore.Bookstore").
    pub name: String,
    pub version: String,
    pub syntax: Syntax,
    pub methods: Vec<Method>,
}

impl Api {
    /// Selector of one of this API's methods.
    pub fn selector(&self, method: &str) -> String {
        format!("{}.{}", self.name, method)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Syntax {
    #[default]
    #[serde(rename = "SYNTAX_PROTO2")]
    Proto2,
    #[serde(rename = "SYNTAX_PROTO3")]
    Proto3,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Method {
    pub name: String,
}

/// Authentication block: providers and per-method rules.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Authentication {
    pub providers: Vec<AuthProvider>,
    pub rules: Vec<AuthRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuthProvider {
    /// Unique within a specification.
    pub id: String,

    pub issuer: String,

    #[serde(alias = "jwksUri")]
    pub jwks_uri: String,

    /// Declared audiences. Empty when the provider declares none.
    #[serde(deserialize_with = "audience_list")]
    pub audiences: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuthRule {
    /// Fully-qualified method name.
    pub selector: String,

    /// Any one requirement is sufficient; empty means the method is open.
    pub requirements: Vec<AuthRequirement>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuthRequirement {
    #[serde(alias = "providerId")]
    pub provider_id: String,

    /// Audience override. Empty means "whatever the provider declares".
    #[serde(deserialize_with = "audience_list")]
    pub audiences: Vec<String>,
}

/// HTTP-mapping rules.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Http {
    pub rules: Vec<HttpRule>,
}

/// Maps an RPC method onto an HTTP verb and path template.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpRule {
    pub selector: String,
    pub get: Option<String>,
    pub put: Option<String>,
    pub post: Option<String>,
    pub delete: Option<String>,
    pub patch: Option<String>,
    pub custom: Option<CustomPattern>,
    pub body: Option<String>,

    #[serde(alias = "additionalBindings")]
    pub additional_bindings: Vec<HttpRule>,
}

impl HttpRule {
    /// The (verb, path template) this rule binds, if it names one.
    pub fn binding(&self) -> Option<(&str, &str)> {
        let verbs = [
            ("GET", &self.get),
            ("PUT", &self.put),
            ("POST", &self.post),
            ("DELETE", &self.delete),
            ("PATCH", &self.patch),
        ];
        if let Some((verb, Some(path))) = verbs.into_iter().find(|(_, p)| p.is_some()) {
            return Some((verb, path.as_str()));
        }
        self.custom
            .as_ref()
            .map(|c| (c.kind.as_str(), c.path.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CustomPattern {
    pub kind: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceInfo {
    pub source_files: Vec<SourceFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceFile {
    pub file_path: String,
    /// Base64-encoded file bytes.
    pub file_contents: String,
    pub file_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Control {
    pub environment: String,
}

/// Audiences arrive either comma-joined ("a1,a2") or as a JSON array.
fn audience_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Joined(String),
        List(Vec<String>),
    }

    let items = match Option::<Raw>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Raw::Joined(s)) => s.split(',').map(str::to_string).collect(),
        Some(Raw::List(v)) => v,
    };

    Ok(items
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bookstore() {
        let spec: ServiceSpecification = serde_json::from_str(
            r#"{
                "name": "bookstore.endpoints.project123.cloud.goog",
                "id": "2017-05-01r0",
                "apis": [{
                    "name": "endpoints.examples.bookstore.Bookstore",
                    "version": "v1",
                    "syntax": "SYNTAX_PROTO3",
                    "methods": [{"name": "ListShelves"}, {"name": "CreateShelf"}]
                }],
                "http": {"rules": [
                    {"selector": "endpoints.examples.bookstore.Bookstore.ListShelves", "get": "/v1/shelves"}
                ]},
                "control": {"environment": "servicecontrol.googleapis.com"},
                "documentation": {"summary": "ignored"}
            }"#,
        )
        .unwrap();

        assert_eq!(spec.id.as_deref(), Some("2017-05-01r0"));
        assert_eq!(spec.apis[0].syntax, Syntax::Proto3);
        assert!(spec.usage_reporting_enabled());
        assert_eq!(
            spec.method_selectors().collect::<Vec<_>>(),
            vec![
                "endpoints.examples.bookstore.Bookstore.ListShelves",
                "endpoints.examples.bookstore.Bookstore.CreateShelf",
            ]
        );
        assert_eq!(spec.http.rules[0].binding(), Some(("GET", "/v1/shelves")));
    }

    #[test]
    fn test_audience_encodings() {
        let auth: Authentication = serde_json::from_str(
            r#"{
                "providers": [
                    {"id": "a", "issuer": "i", "jwks_uri": "u", "audiences": "aud1, aud2,"},
                    {"id": "b", "issuer": "i", "jwksUri": "u", "audiences": ["aud3"]},
                    {"id": "c", "issuer": "i", "jwks_uri": "u"}
                ],
                "rules": [{"selector": "s.M", "requirements": [{"providerId": "a", "audiences": ""}]}]
            }"#,
        )
        .unwrap();

        assert_eq!(auth.providers[0].audiences, vec!["aud1", "aud2"]);
        assert_eq!(auth.providers[1].audiences, vec!["aud3"]);
        assert_eq!(auth.providers[1].jwks_uri, "u");
        assert!(auth.providers[2].audiences.is_empty());
        assert_eq!(auth.rules[0].requirements[0].provider_id, "a");
        assert!(auth.rules[0].requirements[0].audiences.is_empty());
    }

    #[test]
    fn test_custom_and_missing_binding() {
        let rule: HttpRule = serde_json::from_str(
            r#"{"selector": "s.M", "custom": {"kind": "HEAD", "path": "/v1/ping"}}"#,
        )
        .unwrap();
        assert_eq!(rule.binding(), Some(("HEAD", "/v1/ping")));

        let bare: HttpRule = serde_json::from_str(r#"{"selector": "s.M"}"#).unwrap();
        assert_eq!(bare.binding(), None);
    }

    #[test]
    fn test_unknown_syntax_and_descriptor_lookup() {
        let spec: ServiceSpecification = serde_json::from_str(
            r#"{
                "apis": [{"name": "a.B", "syntax": "SYNTAX_EDITIONS"}],
                "sourceInfo": {"sourceFiles": [
                    {"filePath": "a.yaml", "fileContents": "eA==", "fileType": "SERVICE_CONFIG_YAML"},
                    {"filePath": "api_descriptor.pb", "fileContents": "eA==", "fileType": "FILE_DESCRIPTOR_SET_PROTO"}
                ]}
            }"#,
        )
        .unwrap();
        assert_eq!(spec.apis[0].syntax, Syntax::Other);
        assert_eq!(spec.descriptor_file().unwrap().file_path, "api_descriptor.pb");
        assert!(!spec.usage_reporting_enabled());
    }
}
