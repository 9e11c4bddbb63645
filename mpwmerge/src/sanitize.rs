//! Layer whitelisting and text-layer cleanup.

use std::collections::HashSet;

use crate::deps::arcstr::ArcStr;
use crate::layout::cell::CellKey;
use crate::layout::layers::LayerSpec;
use crate::layout::Layout;

/// Prefix of the text markers stamped into layouts by the design tools.
pub const SIGNATURE_PREFIX: &str = "SiEPIC-Tools";
/// Prefix of automated measurement labels.
pub const LABEL_PREFIX: &str = "opt_in";

/// What [`sanitize`] did to a layout.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Sanitized {
    /// Allowed layers present in the layout, in ascending order.
    pub kept: Vec<LayerSpec>,
    /// Disallowed layers and the number of objects removed from each.
    pub deleted: Vec<(LayerSpec, usize)>,
    /// Tool-signature texts removed from the design, one per placed occurrence.
    pub signatures: Vec<ArcStr>,
    /// Measurement labels found under the top cell, one per placed occurrence.
    pub labels: Vec<ArcStr>,
    /// Number of non-text shapes removed from the text layer.
    pub text_shapes_removed: usize,
}

impl Sanitized {
    /// Returns `true` if no layer survived.
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}

/// Strips everything but `allowed` layers from `layout` and cleans up `text_layer` under `top`.
///
/// Running this twice has the same effect as running it once; the second
/// run reports no deletions and no signatures.
pub fn sanitize(
    layout: &mut Layout,
    top: CellKey,
    allowed: &[LayerSpec],
    text_layer: LayerSpec,
) -> Sanitized {
    let mut out = Sanitized::default();
    for layer in layout.layers() {
        if allowed.contains(&layer) {
            out.kept.push(layer);
        } else {
            let removed = layout.delete_layer(layer);
            out.deleted.push((layer, removed));
        }
    }

    if !allowed.contains(&text_layer) {
        return out;
    }

    for text in layout.texts(top) {
        if text.layer != text_layer {
            continue;
        }
        if text.string.starts_with(SIGNATURE_PREFIX) {
            out.signatures.push(text.string.clone());
        } else if text.string.starts_with(LABEL_PREFIX) {
            out.labels.push(text.string.clone());
        }
    }

    let under_top: HashSet<CellKey> = layout.descendants(top).into_iter().collect();
    for (key, cell) in layout.cells_mut() {
        if !under_top.contains(&key) {
            continue;
        }
        cell.annotations_mut()
            .retain(|t| !(t.layer == text_layer && t.string.starts_with(SIGNATURE_PREFIX)));
        let before = cell.elems_mut().len();
        cell.elems_mut().retain(|e| e.layer != text_layer);
        out.text_shapes_removed += before - cell.elems_mut().len();
    }
    out
}
