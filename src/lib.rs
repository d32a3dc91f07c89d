/// Tab Grouper - Chrome Extension that sorts tabs into AI-labelled groups
/// Built with Rust + WASM + Yew

pub mod ai;
pub mod bridge;
pub mod classifier;
pub mod config;
pub mod dedupe;
pub mod domain;
pub mod enrichment;
pub mod error;
pub mod events;
pub mod grouping;
pub mod orchestrator;
pub mod platform;
pub mod tab_data;
pub mod timing;
pub mod ui;

#[cfg(test)]
mod test_support;

use wasm_bindgen::prelude::*;

// Set up panic hook for better error messages in the browser console
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    wasm_logger::init(wasm_logger::Config::default());
}

// Exposed for the options page to check the URL filter
#[wasm_bindgen]
pub fn is_groupable_url(url: &str) -> bool {
    domain::is_groupable_url(url)
}

// Start the Yew app for the popup
#[wasm_bindgen]
pub fn start_popup() {
    yew::Renderer::<ui::popup::App>::new().render();
}
