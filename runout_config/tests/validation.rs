use runout_config::{Action, Numbering, PinSetting, Power, Trigger, load_toml};
use rstest::rstest;

#[test]
fn parses_full_config() {
    let toml = r#"
[sensor]
pin = 11
numbering = "board"
power = "powered"
trigger = "closed"
bounce_ms = 300

[debounce]
samples = 10
interval_ms = 200

[change]
command = "M600 X0 Y0"
capability_check = "M603"
probe_retry_ms = 500
action = "pause"
park_command = "G1 X10 Y10"

[logging]
level = "debug"
rotation = "daily"
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.sensor.pin, PinSetting::Number(11));
    assert_eq!(cfg.sensor.numbering, Numbering::Board);
    assert_eq!(cfg.sensor.power, Power::Powered);
    assert_eq!(cfg.sensor.trigger, Trigger::Closed);
    assert_eq!(cfg.debounce.samples, 10);
    assert_eq!(cfg.change.action, Action::Pause);
    assert_eq!(cfg.bcm_pin(), Some(17));
}

#[test]
fn empty_file_is_disabled_sensor() {
    let cfg = load_toml("").expect("parse empty");
    cfg.validate().expect("defaults valid");
    assert!(!cfg.sensor_enabled());
    assert_eq!(cfg.change.command, "M600 X0 Y0");
    assert_eq!(cfg.change.capability_check, "M603");
}

#[rstest]
#[case("pin = -1")]
#[case("pin = \"disabled\"")]
#[case("")]
fn disabled_sentinels(#[case] line: &str) {
    let cfg = load_toml(&format!("[sensor]\n{line}\n")).expect("parse");
    assert_eq!(cfg.sensor.pin, PinSetting::Disabled);
}

#[rstest]
#[case("pin = -5")]
#[case("pin = 300")]
#[case("pin = \"eleven\"")]
fn rejects_unparseable_pins(#[case] line: &str) {
    assert!(load_toml(&format!("[sensor]\n{line}\n")).is_err());
}

#[rstest]
#[case("board", 1, "not a gpio")]
#[case("board", 6, "not a gpio")]
#[case("board", 41, "out of range")]
#[case("bcm", 28, "out of range")]
fn rejects_pins_invalid_for_numbering(
    #[case] numbering: &str,
    #[case] pin: u8,
    #[case] needle: &str,
) {
    let toml = format!("[sensor]\npin = {pin}\nnumbering = \"{numbering}\"\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject pin");
    assert!(
        format!("{err}").to_lowercase().contains(needle),
        "unexpected message: {err}"
    );
}

#[rstest]
#[case("[debounce]\nsamples = 0", "debounce.samples must be >= 1")]
#[case("[debounce]\ninterval_ms = 0", "debounce.interval_ms must be >= 1")]
#[case("[change]\ncommand = \"\"", "change.command must not be empty")]
#[case("[change]\ncommand = \"M600\\nM117\"", "change.command must be a single line")]
#[case("[change]\nprobe_retry_ms = 0", "change.probe_retry_ms must be >= 1")]
#[case("[change]\naction = \"pause\"\npark_command = \" \"", "change.park_command must not be empty")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation")]
fn rejects_bad_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(format!("{err}").contains(needle), "unexpected message: {err}");
}

#[rstest]
#[case("board", 3, true)]
#[case("board", 5, true)]
#[case("bcm", 2, true)]
#[case("bcm", 3, true)]
#[case("board", 11, false)]
fn warns_about_hardwired_pullups_when_powered(
    #[case] numbering: &str,
    #[case] pin: u8,
    #[case] warned: bool,
) {
    let toml = format!("[sensor]\npin = {pin}\nnumbering = \"{numbering}\"\npower = \"powered\"\n");
    let cfg = load_toml(&toml).expect("parse TOML");
    assert_eq!(!cfg.warnings().is_empty(), warned);
}

#[test]
fn grounded_wiring_never_warns() {
    let cfg = load_toml("[sensor]\npin = 3\n").expect("parse TOML");
    assert!(cfg.warnings().is_empty());
}

#[test]
fn bcm_numbering_passes_through() {
    let cfg = load_toml("[sensor]\npin = 17\nnumbering = \"bcm\"\n").expect("parse TOML");
    cfg.validate().expect("valid");
    assert_eq!(cfg.bcm_pin(), Some(17));
}
