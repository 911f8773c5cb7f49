//! Per-block and per-page override resolution for the selected variant.
//!
//! Both operations are pure reads of the runtime state. When an override does
//! not apply the input comes back unchanged.

use crate::core::types::{BlockDescriptor, ExperimentState, PageLocation};
use crate::core::url::{last_segment, resolve_override};

/// Point a block's code and styles at the selected variant's override.
///
/// Unchanged when: no state, the experiment is not running, control is
/// selected, the block is not an experiment target, the selected variant has
/// no block overrides, control does not list the block, or the selected
/// variant has no entry at the same index.
pub fn patch_block(
    state: Option<&ExperimentState>,
    page: &PageLocation,
    block: &BlockDescriptor,
) -> BlockDescriptor {
    match override_base(state, page, &block.block_name) {
        Some(base) => BlockDescriptor {
            css_path: Some(format!("{base}/{}.css", block.block_name)),
            js_path: Some(format!("{base}/{}.js", block.block_name)),
            ..block.clone()
        },
        None => block.clone(),
    }
}

fn override_base(
    state: Option<&ExperimentState>,
    page: &PageLocation,
    block_name: &str,
) -> Option<String> {
    let state = state.filter(|state| state.run)?;
    if state.is_control_selected() {
        return None;
    }
    if !state.blocks.iter().any(|name| name == block_name) {
        return None;
    }
    let selected = state.selected()?;
    if selected.blocks.is_empty() {
        return None;
    }
    let control = state.control()?;
    let index = control
        .blocks
        .iter()
        .position(|entry| entry == block_name || last_segment(entry) == block_name)?;
    let entry = selected.blocks.get(index)?;
    resolve_override(entry, &page.origin, &page.code_base_path, block_name)
}

/// Page the selected variant serves instead of `current_path`, if any.
///
/// Control's `pages[i]` maps to the selected variant's `pages[i]`.
pub fn page_override<'a>(state: Option<&'a ExperimentState>, current_path: &str) -> Option<&'a str> {
    let state = state.filter(|state| state.run)?;
    if state.is_control_selected() {
        return None;
    }
    let selected = state.selected()?;
    let control = state.control()?;
    let index = control.pages.iter().position(|page| page == current_path)?;
    let page = selected.pages.get(index)?;
    if page == current_path {
        return None;
    }
    Some(page.as_str())
}
