//! TypeScript Generation Tests
//!
//! Validates that the UI-facing camfeed types can be exported to TypeScript
//! when the tauri feature is enabled.

#[cfg(feature = "tauri")]
#[test]
fn test_ui_types_implement_specta_type() {
    use specta::Type;

    // If this compiles, every type the UI receives is configured for export.
    fn assert_type<T: Type>() {}

    // Events and status
    assert_type::<camfeed::StreamEvent>();
    assert_type::<camfeed::StreamStatus>();
    assert_type::<camfeed::ConnectionState>();
    assert_type::<camfeed::DisconnectReason>();
    assert_type::<camfeed::ErrorEvent>();
    assert_type::<camfeed::ErrorKind>();

    // Telemetry and settings
    assert_type::<camfeed::TelemetrySample>();
    assert_type::<camfeed::StreamSettings>();
    assert_type::<camfeed::UpdateRate>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn test_tauri_feature_disabled() {
    // Without the tauri feature the types still compile, just without specta::Type
    let _ = camfeed::UpdateRate::Native;
    let _ = camfeed::StreamStatus::default();
}
