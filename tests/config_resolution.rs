// tests/config_resolution.rs
//! Command line and environment resolution into an export configuration.

use clap::Parser;
use confluence2md::{AppError, CommandLineInput, PageId, PageReference, PipelineConfig};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn resolve(args: &[&str], vars: &[(&str, &str)]) -> Result<PipelineConfig, AppError> {
    let mut argv = vec!["confluence2md"];
    argv.extend_from_slice(args);
    let cli = CommandLineInput::try_parse_from(argv).unwrap();
    let vars: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    PipelineConfig::resolve_with_env(cli, move |key| {
        vars.iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
    })
}

#[test]
fn page_inputs_of_every_form_resolve() {
    let config = resolve(
        &[
            "123",
            "https://wiki.example.com/pages/viewpage.action?pageId=456",
            "https://wiki.example.com/display/ENG/Release+Notes",
        ],
        &[("CONFLUENCE_TOKEN", "secret")],
    )
    .unwrap();

    assert_eq!(
        config.pages,
        vec![
            PageReference::Id(PageId::parse("123").unwrap()),
            PageReference::Id(PageId::parse("456").unwrap()),
            PageReference::SpaceTitle {
                space: "ENG".to_string(),
                title: "Release Notes".to_string(),
            },
        ]
    );
    assert_eq!(config.settings.base_url.as_str(), "https://wiki.example.com");
}

#[test]
fn knobs_flow_into_export_settings() {
    let config = resolve(
        &[
            "--base-url",
            "https://wiki.example.com",
            "--output-dir",
            "out",
            "--timeout",
            "30",
            "--include-timeout",
            "5",
            "--workers",
            "3",
            "--page-concurrency",
            "4",
            "--keep-raw",
            "42",
        ],
        &[("CONFLUENCE_TOKEN", "secret")],
    )
    .unwrap();

    let settings = &config.settings;
    assert_eq!(settings.output_dir, std::path::PathBuf::from("out"));
    assert_eq!(settings.page_timeout, Duration::from_secs(30));
    assert_eq!(settings.include_timeout, Duration::from_secs(5));
    assert_eq!(settings.io_workers, 3);
    assert_eq!(settings.page_concurrency, 4);
    assert!(settings.keep_raw_markup);
}

#[test]
fn bare_ids_need_a_base_url() {
    let result = resolve(&["123"], &[("CONFLUENCE_TOKEN", "secret")]);
    assert!(matches!(result, Err(AppError::MissingConfiguration(_))));
}

#[test]
fn malformed_page_input_is_rejected() {
    let result = resolve(
        &["--base-url", "https://wiki.example.com", "not a page"],
        &[("CONFLUENCE_TOKEN", "secret")],
    );
    assert!(matches!(result, Err(AppError::ValidationError(_))));
}
