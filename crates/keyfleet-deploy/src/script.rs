// ABOUTME: POSIX shell scripts sent to remote hosts for probing, installing and removing keys.
// ABOUTME: Each operation is a single script invocation that prints one confirmation marker.

/// Command whose output proves a session can run commands.
pub const PROBE_COMMAND: &str = "echo 'SSH connection test successful'";

/// Exact trimmed output expected from [`PROBE_COMMAND`].
pub const PROBE_RESPONSE: &str = "SSH connection test successful";

pub const MARKER_INSTALLED: &str = "KEYFLEET_INSTALLED";
pub const MARKER_ALREADY_PRESENT: &str = "KEYFLEET_ALREADY_PRESENT";
pub const MARKER_REMOVED: &str = "KEYFLEET_REMOVED";
pub const MARKER_NOT_PRESENT: &str = "KEYFLEET_NOT_PRESENT";
pub const MARKER_NO_KEY_STORE: &str = "KEYFLEET_NO_KEY_STORE";

/// Quote `value` for POSIX sh using single quotes.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// awk statements setting `hit` when the current line carries `$t $b` as
/// adjacent fields. Lines with a leading options field match too, and a
/// trailing CR is ignored without altering `$0`.
const AWK_MATCH: &str = r#"line = $0; sub(/\r$/, "", line); n = split(line, f); hit = 0; for (i = 1; i < n; i++) if (f[i] == t && f[i + 1] == b) hit = 1;"#;

/// awk exit status for a remove that found nothing to filter.
const AWK_NOTHING_REMOVED: u8 = 10;

/// Append `line` unless a line with the same key type and blob already exists.
///
/// Creates `~/.ssh` (0700) and `authorized_keys` (0600) when absent and
/// terminates a final line that is missing its newline before appending.
pub fn install_script(key_type: &str, key_blob: &str, line: &str) -> String {
    format!(
        r#"umask 077
set -e
d="$HOME/.ssh"
f="$d/authorized_keys"
mkdir -p "$d"
chmod 700 "$d"
[ -f "$f" ] || : > "$f"
chmod 600 "$f"
if [ -s "$f" ] && [ -n "$(tail -c 1 "$f")" ]; then
  printf '\n' >> "$f"
fi
if awk -v t={t} -v b={b} '{{ {awk_match} if (hit) {{ found = 1; exit }} }} END {{ exit !found }}' "$f"; then
  echo {already}
else
  printf '%s\n' {line} >> "$f"
  echo {installed}
fi
"#,
        t = shell_quote(key_type),
        b = shell_quote(key_blob),
        awk_match = AWK_MATCH,
        line = shell_quote(line),
        already = MARKER_ALREADY_PRESENT,
        installed = MARKER_INSTALLED,
    )
}

/// Drop every line with the same key type and blob, rewriting the store
/// through a temporary file and `mv`. The store is left untouched when no
/// line matches.
pub fn remove_script(key_type: &str, key_blob: &str) -> String {
    format!(
        r#"umask 077
set -e
f="$HOME/.ssh/authorized_keys"
if [ ! -f "$f" ]; then
  echo {no_store}
  exit 0
fi
tmp="$f.tmp.$$"
trap 'rm -f "$tmp"' EXIT
rc=0
awk -v t={t} -v b={b} '{{ {awk_match} if (hit) {{ removed++; next }} print }} END {{ exit (removed ? 0 : {nothing}) }}' "$f" > "$tmp" || rc=$?
if [ "$rc" -eq {nothing} ]; then
  echo {not_present}
  exit 0
fi
[ "$rc" -eq 0 ] || exit "$rc"
chmod 600 "$tmp"
mv "$tmp" "$f"
echo {removed}
"#,
        t = shell_quote(key_type),
        b = shell_quote(key_blob),
        awk_match = AWK_MATCH,
        nothing = AWK_NOTHING_REMOVED,
        no_store = MARKER_NO_KEY_STORE,
        not_present = MARKER_NOT_PRESENT,
        removed = MARKER_REMOVED,
    )
}

/// Whether `stdout` contains `marker` on a line of its own.
pub fn has_marker(stdout: &str, marker: &str) -> bool {
    stdout.lines().any(|line| line.trim() == marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$(rm -rf /)"), "'$(rm -rf /)'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_install_script_embeds_quoted_values() {
        let script = install_script("ssh-rsa", "AAAAB3", "ssh-rsa AAAAB3 o'brien@host");
        assert!(script.contains("-v t='ssh-rsa' -v b='AAAAB3'"));
        assert!(script.contains(r"printf '%s\n' 'ssh-rsa AAAAB3 o'\''brien@host'"));
        assert!(script.starts_with("umask 077\n"));
        assert!(script.contains("echo KEYFLEET_ALREADY_PRESENT"));
        assert!(script.contains("echo KEYFLEET_INSTALLED"));
    }

    #[test]
    fn test_remove_script_uses_temp_file_and_rename() {
        let script = remove_script("ssh-ed25519", "AAAAC3");
        assert!(script.contains("> \"$tmp\""));
        assert!(script.contains("mv \"$tmp\" \"$f\""));
        assert!(script.contains("echo KEYFLEET_NO_KEY_STORE"));
        assert!(script.contains("echo KEYFLEET_NOT_PRESENT"));
        assert!(script.contains("echo KEYFLEET_REMOVED"));
    }

    #[test]
    fn test_match_ignores_trailing_carriage_return() {
        assert!(AWK_MATCH.contains(r#"sub(/\r$/, "", line)"#));
    }

    #[test]
    fn test_has_marker_requires_whole_line() {
        assert!(has_marker("motd\nKEYFLEET_INSTALLED\n", MARKER_INSTALLED));
        assert!(!has_marker("not KEYFLEET_INSTALLED here", MARKER_INSTALLED));
        assert!(!has_marker("", MARKER_INSTALLED));
    }
}
