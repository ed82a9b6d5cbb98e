use serde::{Deserialize, Serialize};

/// The `bazel_registry.json` file stored at and defining an index registry.
///
/// The config file may look like this:
///
/// ```json
/// {
///   "mirrors": [
///     "https://mirror.example.com/",
///     "https://mirror2.example.com/"
///   ],
///   "module_base_path": "../modules"
/// }
/// ```
///
/// Archive URLs from `source.json` are tried through each mirror in order
/// before the original URL. `module_base_path` resolves `local_path`
/// source types relative to the registry root.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mirrors: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_base_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::RegistryConfig;

    #[test]
    fn deserialize() {
        let expected = RegistryConfig {
            mirrors: vec!["https://mirror.example.com/".into()],
            module_base_path: Some("../modules".into()),
        };

        let actual: RegistryConfig = serde_json::from_str(
            r#"{
              "mirrors": ["https://mirror.example.com/"],
              "module_base_path": "../modules"
            }"#,
        )
        .unwrap();

        assert_eq!(actual, expected);
    }

    #[test]
    fn empty_config_is_valid() {
        let actual: RegistryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(actual, RegistryConfig::default());
        assert_eq!(serde_json::to_string(&actual).unwrap(), "{}");
    }
}
