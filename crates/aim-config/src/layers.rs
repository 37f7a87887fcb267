//! Layered lookup: one precedence helper shared by every resolved field.
//!
//! A chain is an ordered list of `(Layer, Option<T>)`; the first set value wins
//! and is returned together with the layer it came from.

use serde::Serialize;

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// `tools.<tool>.profiles.<profile>`
    Profile,
    /// `keys.<key>`
    Credential,
    /// `tools.<tool>.defaults`
    ToolDefaults,
    /// `vendors.<vendor>`
    Vendor,
    /// `[settings]`
    Settings,
    /// `vendors.<vendor>.tools.<tool>`
    VendorToolDefault,
    /// `tools.<tool>.protocol`
    ToolProtocol,
    /// `vendors.<vendor>.endpoints.<endpoint>`
    Endpoint,
    /// Compiled-in constant.
    Builtin,
    /// Caller-supplied flag.
    Override,
    /// Nothing set anywhere.
    Unset,
}

impl std::fmt::Display for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Layer::Profile => "profile",
            Layer::Credential => "key",
            Layer::ToolDefaults => "tool defaults",
            Layer::Vendor => "vendor",
            Layer::Settings => "settings",
            Layer::VendorToolDefault => "vendor tool default",
            Layer::ToolProtocol => "tool protocol",
            Layer::Endpoint => "endpoint",
            Layer::Builtin => "built-in default",
            Layer::Override => "command-line override",
            Layer::Unset => "unset",
        };
        f.write_str(label)
    }
}

/// A value paired with the layer that supplied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub value: T,
    pub layer: Layer,
}

impl<T> Sourced<T> {
    pub fn new(value: T, layer: Layer) -> Self {
        Self { value, layer }
    }
}

/// Values that count as "not set" even when present.
pub trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for &str {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for u64 {
    fn is_blank(&self) -> bool {
        *self == 0
    }
}

impl Blank for std::time::Duration {
    fn is_blank(&self) -> bool {
        self.is_zero()
    }
}

/// First non-blank value in `layers`, in order.
pub fn first_layer<T: Blank>(
    layers: impl IntoIterator<Item = (Layer, Option<T>)>,
) -> Option<Sourced<T>> {
    layers.into_iter().find_map(|(layer, value)| {
        value
            .filter(|v| !v.is_blank())
            .map(|value| Sourced::new(value, layer))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_set_layer_wins() {
        let found = first_layer([
            (Layer::Profile, None),
            (Layer::Credential, Some("from-key".to_string())),
            (Layer::ToolProtocol, Some("from-tool".to_string())),
        ]);
        assert_eq!(found, Some(Sourced::new("from-key".to_string(), Layer::Credential)));
    }

    #[test]
    fn test_blank_values_are_skipped() {
        let found = first_layer([
            (Layer::Profile, Some(String::new())),
            (Layer::Endpoint, Some("m".to_string())),
        ]);
        assert_eq!(found.map(|s| s.layer), Some(Layer::Endpoint));

        let found = first_layer([(Layer::ToolDefaults, Some(0u64)), (Layer::Vendor, Some(5u64))]);
        assert_eq!(found, Some(Sourced::new(5, Layer::Vendor)));
    }

    #[test]
    fn test_nothing_set() {
        let found: Option<Sourced<String>> =
            first_layer([(Layer::Profile, None), (Layer::Endpoint, Some(String::new()))]);
        assert_eq!(found, None);
    }
}
