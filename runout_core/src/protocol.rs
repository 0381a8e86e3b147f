//! Firmware line patterns the monitor reacts to. Matching is literal and
//! case-sensitive.

const PAUSED_FOR_USER: &str = "busy: paused for user";
const PROCESSING: &str = "echo:busy: processing";
const KEEPALIVE: &str = "M113";

/// `^ok`
#[inline]
pub fn is_ok(line: &str) -> bool {
    line.starts_with("ok")
}

/// `^echo:Unknown command: "<command>"`
pub fn is_unknown_command(line: &str, command: &str) -> bool {
    line.strip_prefix("echo:Unknown command: \"")
        .and_then(|rest| rest.strip_prefix(command))
        .is_some_and(|rest| rest.starts_with('"'))
}

#[inline]
pub fn is_paused_for_user(line: &str) -> bool {
    line.contains(PAUSED_FOR_USER)
}

#[inline]
pub fn is_processing(line: &str) -> bool {
    line.contains(PROCESSING)
}

/// Host keepalive (`^M113`), sent while the firmware is busy.
#[inline]
pub fn is_keepalive(command: &str) -> bool {
    command.starts_with(KEEPALIVE)
}

/// First token of the change command, e.g. `M600` for `M600 X0 Y0`.
pub fn macro_prefix(change_command: &str) -> &str {
    change_command.split_whitespace().next().unwrap_or("")
}

/// True when `command` invokes the change macro, with or without arguments.
pub fn invokes_macro(command: &str, change_command: &str) -> bool {
    let prefix = macro_prefix(change_command);
    !prefix.is_empty() && command.split_whitespace().next() == Some(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ok", true)]
    #[case("ok T:210.0 /210.0", true)]
    #[case(" ok", false)]
    #[case("T:210.0 /210.0 B:60.0 /60.0", false)]
    fn ok_is_anchored(#[case] line: &str, #[case] want: bool) {
        assert_eq!(is_ok(line), want);
    }

    #[rstest]
    #[case("echo:Unknown command: \"M603\"", true)]
    #[case("echo:Unknown command: \"M603\" ", true)]
    #[case("echo:Unknown command: \"M6030\"", false)]
    #[case("echo:Unknown command: \"M600\"", false)]
    #[case("Unknown command: \"M603\"", false)]
    fn unknown_command_names_the_check(#[case] line: &str, #[case] want: bool) {
        assert_eq!(is_unknown_command(line, "M603"), want);
    }

    #[test]
    fn busy_patterns_match_anywhere() {
        assert!(is_paused_for_user("echo:busy: paused for user"));
        assert!(is_paused_for_user("busy: paused for user"));
        assert!(is_processing("echo:busy: processing"));
        assert!(!is_processing("busy: processing"));
    }

    #[rstest]
    #[case("M113", true)]
    #[case("M113 S2", true)]
    #[case("G1 X10", false)]
    #[case(" M113", false)]
    fn keepalive_is_anchored(#[case] cmd: &str, #[case] want: bool) {
        assert_eq!(is_keepalive(cmd), want);
    }

    #[test]
    fn macro_invocation_compares_first_token() {
        assert_eq!(macro_prefix("M600 X0 Y0"), "M600");
        assert!(invokes_macro("M600", "M600 X0 Y0"));
        assert!(invokes_macro("M600 X10", "M600 X0 Y0"));
        assert!(!invokes_macro("M6000", "M600 X0 Y0"));
        assert!(!invokes_macro("M600", ""));
    }
}
