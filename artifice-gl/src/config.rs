/// Context configuration.
///
/// Limits set here cap the limits reported by the API; they never raise them.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serializing", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serializing", serde(default))]
pub struct ContextConfig {
    /// Caps the number of usable texture units.
    pub max_texture_units: Option<u32>,
    /// Caps the number of indexed binding points of every indexable buffer target.
    pub max_indexed_bindings: Option<u32>,
    /// Skip activation calls that would not change the binding state.
    ///
    /// When disabled, every activation is forwarded to the API (the binding table is still kept
    /// up to date). Useful to rule out the cache when chasing state bugs.
    pub elide_redundant_binds: bool,
}

impl ContextConfig {
    pub const fn new() -> ContextConfig {
        ContextConfig {
            max_texture_units: None,
            max_indexed_bindings: None,
            elide_redundant_binds: true,
        }
    }

    pub const fn max_texture_units(self, units: u32) -> Self {
        ContextConfig {
            max_texture_units: Some(units),
            ..self
        }
    }

    pub const fn max_indexed_bindings(self, count: u32) -> Self {
        ContextConfig {
            max_indexed_bindings: Some(count),
            ..self
        }
    }

    pub const fn elide_redundant_binds(self, elide: bool) -> Self {
        ContextConfig {
            elide_redundant_binds: elide,
            ..self
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig::new()
    }
}
