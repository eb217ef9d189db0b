use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cache_settings_use_correct_defaults() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.cache.app_name, "podcast");
    assert_eq!(settings.cache.version, "v1.02");
    assert_eq!(
        settings.cache.manifest,
        vec![
            "./",
            "./index.html",
            "./assets/app.js",
            "./assets/style.css",
            "./assets/episodes.json",
        ]
    );
    assert_eq!(settings.cache.content_suffix, ".mp3");
    assert_eq!(settings.cache.content_segment, "/audio/");
    assert!(settings.cache.eager_activation);
    assert!(settings.cache.notify_failures);
    assert_eq!(settings.origin.request_timeout, Duration::from_secs(30));
    assert_eq!(settings.store.backend, StoreBackend::Filesystem);
    assert_eq!(settings.clients.channel_capacity.get(), 64);
}

#[test]
fn origin_base_url_gains_trailing_slash() {
    let mut raw = RawSettings::default();
    raw.origin.base_url = Some("https://podcast.example/app#top".to_string());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.origin.base_url.as_str(),
        "https://podcast.example/app/"
    );
}

#[test]
fn origin_rejects_non_http_scheme() {
    let mut raw = RawSettings::default();
    raw.origin.base_url = Some("ftp://podcast.example/".to_string());

    let err = Settings::from_raw(raw).expect_err("ftp is rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "origin.base_url",
            ..
        }
    ));
}

#[test]
fn version_must_be_a_safe_namespace_part() {
    let mut raw = RawSettings::default();
    raw.cache.version = Some("../v2".to_string());

    let err = Settings::from_raw(raw).expect_err("path traversal rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.version",
            ..
        }
    ));
}

#[test]
fn unknown_store_backend_is_rejected() {
    let mut raw = RawSettings::default();
    raw.store.backend = Some("redis".to_string());

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn zero_channel_capacity_is_rejected() {
    let mut raw = RawSettings::default();
    raw.clients.channel_capacity = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero capacity");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "clients.channel_capacity",
            ..
        }
    ));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["podcache"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "podcache",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--origin-url",
        "https://podcast.example/",
        "--store-backend",
        "memory",
        "--cache-eager-activation=false",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.origin.origin_url.as_deref(),
                Some("https://podcast.example/")
            );
            assert_eq!(
                serve.overrides.store.store_backend,
                Some(StoreBackendArg::Memory)
            );
            assert_eq!(serve.overrides.cache_eager_activation, Some(false));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_warm_arguments() {
    let args = CliArgs::parse_from([
        "podcache",
        "warm",
        "--cache-version",
        "v2.00",
        "--store-directory",
        "/var/cache/podcache",
    ]);

    match args.command.expect("warm command") {
        Command::Warm(warm) => {
            assert_eq!(warm.origin.cache_version.as_deref(), Some("v2.00"));
            assert_eq!(
                warm.store.store_directory.as_deref(),
                Some(std::path::Path::new("/var/cache/podcache"))
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn warm_overrides_reach_settings() {
    let mut raw = RawSettings::default();
    raw.apply_origin_overrides(&OriginOverrides {
        cache_version: Some("v2.00".to_string()),
        ..Default::default()
    });
    raw.apply_store_overrides(&StoreOverrides {
        store_backend: Some(StoreBackendArg::Memory),
        ..Default::default()
    });

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.cache.version, "v2.00");
    assert_eq!(settings.store.backend, StoreBackend::Memory);
}

#[test]
fn parse_namespaces_arguments() {
    let args = CliArgs::parse_from(["podcache", "namespaces", "--store-backend", "filesystem"]);

    match args.command.expect("namespaces command") {
        Command::Namespaces(ns) => {
            assert_eq!(ns.store.store_backend, Some(StoreBackendArg::Filesystem));
        }
        _ => panic!("wrong command parsed"),
    }
}
