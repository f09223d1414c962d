use live_transcript::Config;
use std::io::Write;

#[test]
fn test_defaults_without_file() {
    let cfg = Config::load_with_prefix("does/not/exist/live-transcript", "LT_TEST_DEFAULTS").unwrap();

    assert_eq!(cfg.channel.url, "ws://localhost:8080/ws");
    assert_eq!(cfg.channel.base_delay_ms, 1000);
    assert_eq!(cfg.channel.max_delay_ms, None);
    assert_eq!(cfg.transcription.lang, "en-US");
}

#[test]
fn test_load_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("live-transcript.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"
[channel]
url = "wss://transcripts.example.com/live"
base_delay_ms = 500
max_delay_ms = 30000

[transcription]
lang = "ja-JP"
"#
    )
    .unwrap();

    let cfg = Config::load_with_prefix(path.to_str().unwrap(), "LT_TEST_FILE").unwrap();

    assert_eq!(cfg.channel.url, "wss://transcripts.example.com/live");
    assert_eq!(cfg.channel.base_delay_ms, 500);
    assert_eq!(cfg.channel.max_delay_ms, Some(30000));
    assert_eq!(cfg.transcription.lang, "ja-JP");

    let backoff = cfg.channel.backoff();
    assert_eq!(backoff.delay(0).as_millis(), 500);
    assert_eq!(backoff.delay(1).as_millis(), 1000);
    assert_eq!(backoff.delay(10).as_millis(), 30000);
}

#[test]
fn test_environment_overrides() {
    std::env::set_var("LT_TEST_ENV__CHANNEL__URL", "ws://override:9000/ws");
    std::env::set_var("LT_TEST_ENV__TRANSCRIPTION__LANG", "fr-FR");

    let cfg = Config::load_with_prefix("does/not/exist/live-transcript", "LT_TEST_ENV").unwrap();

    assert_eq!(cfg.channel.url, "ws://override:9000/ws");
    assert_eq!(cfg.transcription.lang, "fr-FR");
    assert_eq!(cfg.channel.base_delay_ms, 1000);
}
