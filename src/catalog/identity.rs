use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Edition key of a catalog (e.g., `vulkan_core`, `vulkan_beta`).
///
/// One key per upstream header variant; the repository keys loaded catalogs
/// by it so passes can be looked up after the run.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogKey(pub String);

/// Name of a feature structure as declared by the API registry.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureName(pub String);

/// Field name of a capability in the emitted record.
///
/// Usually the bare member name from the registry; the canonicalizer appends
/// a vendor suffix when the bare name is ambiguous inside a structure family.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityName(pub String);

impl StructureName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CapabilityName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// C identifier: `[A-Za-z_][A-Za-z0-9_]*`. Structure names, capability
/// names and guard macros all have this shape.
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

impl fmt::Display for StructureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CapabilityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Core API version, ordered numerically (1.0 < 1.1 < ... < 1.4).
///
/// Serialized as `"major.minor"` or `"major.minor.patch"`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ApiVersion {
    pub const V1_0: ApiVersion = ApiVersion::new(1, 0, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = match parts.next() {
            Some(raw) => raw.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

impl Serialize for ApiVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ApiVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        ApiVersion::parse(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid API version '{value}'")))
    }
}

/// What declares a structure: a numbered core version or a named extension.
///
/// Extensions are unordered relative to versions; the catalog position is the
/// only order between them.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Version(ApiVersion),
    Extension(String),
}

impl Origin {
    /// Minimum core version needed to use a capability of this origin.
    pub fn min_version(&self) -> ApiVersion {
        match self {
            Origin::Version(version) => *version,
            Origin::Extension(_) => ApiVersion::V1_0,
        }
    }

    /// Extension that must be enabled, if any.
    pub fn extension(&self) -> Option<&str> {
        match self {
            Origin::Version(_) => None,
            Origin::Extension(name) => Some(name.as_str()),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Version(version) => write!(f, "core {version}"),
            Origin::Extension(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_follow_c_rules() {
        for good in ["VkPhysicalDeviceFeatures2", "_private", "VK_ENABLE_BETA_EXTENSIONS"] {
            assert!(is_identifier(good), "{good}");
        }
        for bad in ["", "2fast", "Vk Features", "VkFeatures;", "chain-tail"] {
            assert!(!is_identifier(bad), "{bad}");
        }
    }

    #[test]
    fn api_version_parses_two_and_three_components() {
        assert_eq!(ApiVersion::parse("1.2"), Some(ApiVersion::new(1, 2, 0)));
        assert_eq!(ApiVersion::parse("1.3.7"), Some(ApiVersion::new(1, 3, 7)));
        assert_eq!(ApiVersion::parse("1"), None);
        assert_eq!(ApiVersion::parse("1.2.3.4"), None);
        assert_eq!(ApiVersion::parse("one.two"), None);
    }

    #[test]
    fn api_versions_order_numerically() {
        let mut versions = vec![
            ApiVersion::new(1, 4, 0),
            ApiVersion::new(1, 0, 0),
            ApiVersion::new(1, 11, 0),
            ApiVersion::new(1, 2, 0),
        ];
        versions.sort();
        let rendered: Vec<String> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["1.0", "1.2", "1.4", "1.11"]);
    }

    #[test]
    fn origin_serde_matches_catalog_shape() {
        let core: Origin = serde_json::from_str(r#"{"version":"1.3"}"#).unwrap();
        assert_eq!(core, Origin::Version(ApiVersion::new(1, 3, 0)));
        assert_eq!(core.min_version(), ApiVersion::new(1, 3, 0));
        assert_eq!(core.extension(), None);

        let ext: Origin = serde_json::from_str(r#"{"extension":"VK_EXT_mesh_shader"}"#).unwrap();
        assert_eq!(ext.extension(), Some("VK_EXT_mesh_shader"));
        assert_eq!(ext.min_version(), ApiVersion::V1_0);
        assert_eq!(
            serde_json::to_string(&ext).unwrap(),
            r#"{"extension":"VK_EXT_mesh_shader"}"#
        );

        let bad = serde_json::from_str::<Origin>(r#"{"version":"latest"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn names_serialize_transparently() {
        let name = StructureName("VkPhysicalDeviceVulkan12Features".to_string());
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"VkPhysicalDeviceVulkan12Features\"");
        let back: StructureName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);

        let key: CatalogKey = serde_json::from_str("\"vulkan_beta\"").unwrap();
        assert_eq!(key.to_string(), "vulkan_beta");
    }
}
