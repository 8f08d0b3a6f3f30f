use serde::{Deserialize, Serialize};

use crate::boundary::resolver::RetryPolicy;
use crate::capture::event_capture::CaptureOptions;
use crate::dom::event::EventType;
use crate::normalizer::event_normalizer::NormalizerOptions;
use crate::step::builder::{DEFAULT_LABEL, MERGE_WINDOW_MS, StepBuilderOptions};
use crate::tracker::change_tracker::TrackerOptions;

pub const DEFAULT_HIGHLIGHT_CLASS: &str = "recorder-highlight";

/// Recorder settings. Every field has a default, so a partial YAML file
/// (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default = "default_capture_events")]
    pub capture_events: Vec<EventType>,

    #[serde(default = "default_true")]
    pub include_iframes: bool,

    #[serde(default = "default_true")]
    pub include_shadow_dom: bool,

    #[serde(default = "default_debounce")]
    pub input_debounce_delay_ms: u64,

    #[serde(default)]
    pub emit_intermediate_changes: bool,

    #[serde(default = "default_true")]
    pub highlight_elements: bool,

    #[serde(default = "default_highlight_duration")]
    pub highlight_duration_ms: u64,

    #[serde(default = "default_highlight_class")]
    pub highlight_class: String,

    #[serde(default = "default_true")]
    pub trusted_events_only: bool,

    /// 0 means unlimited. Once reached, further steps are dropped and
    /// edits no longer merge into the last step.
    #[serde(default)]
    pub max_steps: usize,

    #[serde(default = "default_dedup_window")]
    pub dedup_window_ms: u64,

    #[serde(default = "default_coalesce_window")]
    pub coalesce_window_ms: u64,

    #[serde(default = "default_merge_window")]
    pub merge_window_ms: u64,

    #[serde(default = "default_true")]
    pub merge_consecutive_inputs: bool,

    #[serde(default = "default_label")]
    pub default_label: String,

    #[serde(default = "default_true")]
    pub mask_sensitive_values: bool,

    #[serde(default = "default_three")]
    pub frame_access_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub frame_retry_delay_ms: u64,

    /// 0 disables auto-save.
    #[serde(default)]
    pub auto_save_interval_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            capture_events: default_capture_events(),
            include_iframes: true,
            include_shadow_dom: true,
            input_debounce_delay_ms: 300,
            emit_intermediate_changes: false,
            highlight_elements: true,
            highlight_duration_ms: 500,
            highlight_class: DEFAULT_HIGHLIGHT_CLASS.to_string(),
            trusted_events_only: true,
            max_steps: 0,
            dedup_window_ms: 50,
            coalesce_window_ms: 100,
            merge_window_ms: MERGE_WINDOW_MS,
            merge_consecutive_inputs: true,
            default_label: DEFAULT_LABEL.to_string(),
            mask_sensitive_values: true,
            frame_access_retries: 3,
            frame_retry_delay_ms: 500,
            auto_save_interval_ms: 0,
        }
    }
}

// Serde default helpers
fn default_capture_events() -> Vec<EventType> {
    vec![
        EventType::MouseDown,
        EventType::Input,
        EventType::Change,
        EventType::KeyDown,
        EventType::Blur,
        EventType::Submit,
    ]
}
fn default_true() -> bool { true }
fn default_three() -> u32 { 3 }
fn default_debounce() -> u64 { 300 }
fn default_highlight_duration() -> u64 { 500 }
fn default_highlight_class() -> String { DEFAULT_HIGHLIGHT_CLASS.to_string() }
fn default_dedup_window() -> u64 { 50 }
fn default_coalesce_window() -> u64 { 100 }
fn default_merge_window() -> u64 { MERGE_WINDOW_MS }
fn default_label() -> String { DEFAULT_LABEL.to_string() }
fn default_retry_delay() -> u64 { 500 }

// ============================================================================
// Per-component options
// ============================================================================

impl RecorderConfig {
    /// Input debouncing belongs to the tracker, so capture never buffers.
    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            filter_synthetic_events: self.trusted_events_only,
            dedup_window_ms: self.dedup_window_ms,
            debounce_input: false,
            input_debounce_ms: self.input_debounce_delay_ms,
            ignored_classes: self.transient_classes(),
            ..CaptureOptions::default()
        }
    }

    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            debounce_delay_ms: self.input_debounce_delay_ms,
            emit_intermediate_changes: self.emit_intermediate_changes,
        }
    }

    pub fn normalizer_options(&self) -> NormalizerOptions {
        NormalizerOptions {
            coalesce_window_ms: self.coalesce_window_ms,
            resolve_through_shadow: self.include_shadow_dom,
            include_iframe_chain: self.include_iframes,
            include_shadow_chain: self.include_shadow_dom,
            ignored_classes: self.transient_classes(),
        }
    }

    /// Classes the recorder adds to the page itself.
    fn transient_classes(&self) -> Vec<String> {
        vec![self.highlight_class.clone()]
    }

    pub fn builder_options(&self) -> StepBuilderOptions {
        StepBuilderOptions {
            default_label: self.default_label.clone(),
            mask_sensitive_values: self.mask_sensitive_values,
            merge_window_ms: self.merge_window_ms,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.frame_access_retries,
            delay_ms: self.frame_retry_delay_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config: RecorderConfig =
            serde_yaml::from_str("max_steps: 5\ncapture_events: [click, input]\n").unwrap();
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.capture_events, vec![EventType::Click, EventType::Input]);
        assert_eq!(config.input_debounce_delay_ms, 300);
        assert!(config.trusted_events_only);
        assert_eq!(config.default_label, "Unlabeled element");
    }

    #[test]
    fn capture_never_buffers_input() {
        let config = RecorderConfig {
            trusted_events_only: false,
            ..RecorderConfig::default()
        };
        let options = config.capture_options();
        assert!(!options.debounce_input);
        assert!(!options.filter_synthetic_events);
    }
}
