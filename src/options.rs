//! View configuration: which grouping dimensions are enabled.
//!
//! The options value is threaded explicitly into every tree computation so
//! the engine stays a pure function of its inputs; nothing in this crate
//! reads grouping state from globals.

use serde::{Deserialize, Serialize};

/// The grouping dimension a children container groups by.  The chain of
/// layers from the root down is derived from [`ViewOptions`]; disabling a
/// dimension collapses its layer out of the hierarchy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Layer {
    Severity,
    InspectionCategory,
    Inspection,
    Module,
    /// The directory/file partition.  With `group_by_directory` enabled this
    /// container holds nested `Directory` nodes with `File` leaves inside;
    /// otherwise it holds a flat list of `File` nodes.
    Files,
    Problems,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ViewOptions {
    #[serde(default = "default_true")]
    pub group_by_severity: bool,
    #[serde(default = "default_true")]
    pub group_by_inspection: bool,
    #[serde(default)]
    pub group_by_module: bool,
    #[serde(default = "default_true")]
    pub group_by_directory: bool,
    /// Whether the hosting environment supports module grouping at all.
    /// When false, `group_by_module` is forced off by [`ViewOptions::clamped`]
    /// before the engine ever sees the options.
    #[serde(default = "default_true")]
    pub module_support: bool,
    /// Keep excluded problems visible (at problem count 0) instead of
    /// pruning them from the tree.
    #[serde(default)]
    pub show_excluded: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ViewOptions {
    fn default() -> ViewOptions {
        ViewOptions {
            group_by_severity: true,
            group_by_inspection: true,
            group_by_module: false,
            group_by_directory: true,
            module_support: true,
            show_excluded: false,
        }
    }
}

impl ViewOptions {
    /// Resolve configuration inconsistency before it reaches the tree: the
    /// engine is never asked to build a node kind it cannot support.
    pub fn clamped(mut self) -> ViewOptions {
        if !self.module_support {
            self.group_by_module = false;
        }
        self
    }

    /// The layer the root's children group by.
    pub fn first_layer(&self) -> Layer {
        if self.group_by_severity {
            Layer::Severity
        } else {
            self.layer_below(Layer::Severity)
        }
    }

    /// The layer one level beneath `layer`, skipping disabled dimensions.
    /// `Problems` is the leaf layer and maps to itself.
    pub fn layer_below(&self, layer: Layer) -> Layer {
        match layer {
            Layer::Severity => {
                if self.group_by_inspection {
                    Layer::InspectionCategory
                } else {
                    self.layer_below(Layer::Inspection)
                }
            }
            Layer::InspectionCategory => Layer::Inspection,
            Layer::Inspection => {
                if self.group_by_module {
                    Layer::Module
                } else {
                    Layer::Files
                }
            }
            Layer::Module => Layer::Files,
            Layer::Files => Layer::Problems,
            Layer::Problems => Layer::Problems,
        }
    }
}
