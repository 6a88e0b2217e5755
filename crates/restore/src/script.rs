//! Restore script rendering.
//!
//! Scripts are rendered with [upon]. Besides the built-in template, any
//! template can be supplied through [`FromStr`]; it is handed the following
//! variables, and an `sh` formatter that single-quotes a value for the shell.
//!
//! | Variable         | Type             | Description                                  |
//! |------------------|------------------|----------------------------------------------|
//! | `hostname`       | `String`         | Host the backup belongs to                   |
//! | `number`         | `u64`            | Backup number                                |
//! | `created`        | `Option<String>` | RFC 3339 timestamp of the oldest part        |
//! | `finalized`      | `bool`           | Whether a finalization marker was seen       |
//! | `expires`        | `String`         | RFC 3339 timestamp the URLs expire at        |
//! | `expires_ts`     | `i64`            | The same, as a Unix timestamp                |
//! | `scratch`        | `String`         | Download directory, relative to the target   |
//! | `count`          | `u64`            | Number of parts                              |
//! | `parts`          | list             | `{ key, url, path }` per part, in order      |
//! | `any_encrypted`  | `bool`           | Whether `encrypted` is non-empty             |
//! | `encrypted`      | list of `String` | Scratch paths of the parts to decrypt        |
//! | `archive`        | list of `String` | Scratch paths to concatenate, in order       |

use crate::error::{Error, ErrorKind, Result};
use crate::plan::RestorePlan;
use exn::ResultExt;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use tracing::instrument;
use upon::{Engine, Template, Value};

/// Directory the parts are downloaded into, inside the restore target.
const SCRATCH_DIR: &str = ".restorescript-scratch";

const DEFAULT_TEMPLATE: &str = r##"#!/bin/sh
# Restore script for backup {{ number }}.
{% if created %}# Backup created {{ created }}.
{% endif %}{% if not finalized %}# WARNING: this backup was never finalized and may be incomplete.
{% endif %}# Usage: sh restore.sh /path/to/empty/directory
#
# WARNING: the download links in this script expire at {{ expires }}.
set -e

host={{ hostname|sh }}

if [ "$(date +%s)" -gt {{ expires_ts }} ]; then
    echo "Sorry, this restore script expired at {{ expires }}." >&2
    exit 1
fi
if [ -z "$1" ]; then
    echo "Usage: $0 /path/to/restore/to" >&2
    exit 1
fi
if [ ! -d "$1" ]; then
    echo "Target $1 does not exist." >&2
    exit 1
fi
if [ -n "$(ls -A "$1")" ]; then
    echo "Target $1 is not empty." >&2
    exit 1
fi

cd "$1"
mkdir {{ scratch|sh }}

# Download {{ count }} part(s).
{% for part in parts %}wget -q -O {{ part.path|sh }} {{ part.url|sh }}
{% endfor %}{% if any_encrypted %}
# Decrypt.
gpg --decrypt-files{% for path in encrypted %} {{ path|sh }}{% endfor %}
{% endif %}
# Join the parts and unpack.
cat{% for path in archive %} {{ path|sh }}{% endfor %} | tar -xf -
rm -r {{ scratch|sh }}

echo "Restored $host backup {{ number }}."
"##;

/// Renders a [`RestorePlan`] into a shell script.
///
/// The template is compiled on construction, so syntax errors surface before
/// any plan is built.
pub struct RestoreScript {
    engine: Engine<'static>,
    template: Template<'static>,
}
impl FromStr for RestoreScript {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        let template = engine.compile(s.to_string()).or_raise(|| ErrorKind::Template)?;
        Ok(Self { engine, template })
    }
}
impl RestoreScript {
    /// The built-in template.
    pub fn new() -> Result<Self> {
        DEFAULT_TEMPLATE.parse()
    }

    #[instrument(skip_all, fields(host = %plan.hostname, backup = plan.number, parts = plan.parts.len()))]
    pub fn render(&self, plan: &RestorePlan) -> Result<String> {
        self.template.render(&self.engine, Self::parameters(plan)?).to_string().or_raise(|| ErrorKind::Template)
    }

    fn parameters(plan: &RestorePlan) -> Result<Value> {
        let created = match plan.created {
            Some(created) => Some(created.format(&Rfc3339).or_raise(|| ErrorKind::Template)?),
            None => None,
        };
        let expires = plan.expires_at.format(&Rfc3339).or_raise(|| ErrorKind::Template)?;
        let scratch = |name: &str| format!("{SCRATCH_DIR}/{name}");

        let parts: Vec<Value> = plan
            .parts
            .iter()
            .map(|part| {
                upon::value! {
                    key: &part.key,
                    url: &part.url,
                    path: scratch(&part.key),
                }
            })
            .collect();
        let encrypted: Vec<Value> =
            plan.parts.iter().filter(|p| p.is_encrypted()).map(|p| Value::from(scratch(&p.key))).collect();
        let archive: Vec<Value> = plan.parts.iter().map(|p| Value::from(scratch(p.archive_name()))).collect();

        Ok(upon::value! {
            hostname: &plan.hostname,
            number: plan.number,
            created: created,
            finalized: plan.finalized,
            expires: expires,
            expires_ts: plan.expires_at.unix_timestamp(),
            scratch: SCRATCH_DIR,
            count: plan.parts.len() as u64,
            parts: parts,
            any_encrypted: !encrypted.is_empty(),
            encrypted: encrypted,
            archive: archive,
        })
    }
}

/// Custom [`upon`] extensions for shell output.
mod addons {
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    /// Single-quotes strings so the shell never expands them.
    fn shell_quote(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => write!(f, "'{}'", s.replace('\'', r"'\''"))?,
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("sh", shell_quote);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::RestorePart;
    use time::macros::datetime;

    fn plan(keys: &[&str]) -> RestorePlan {
        RestorePlan {
            hostname: "web1".to_string(),
            number: 3,
            created: Some(datetime!(2024-05-31 22:00 UTC)),
            finalized: true,
            expires_at: datetime!(2024-06-02 00:00 UTC),
            parts: keys
                .iter()
                .map(|key| RestorePart { key: key.to_string(), url: format!("https://s3.invalid/{key}?a=1&b=2"), size: 1 })
                .collect(),
        }
    }

    #[test]
    fn test_render_encrypted_parts() {
        let script = RestoreScript::new().unwrap().render(&plan(&["web1.3.tar.aa.gpg", "web1.3.tar.ab.gpg"])).unwrap();
        assert!(script.starts_with("#!/bin/sh\n# Restore script for backup 3.\n"));
        assert!(script.contains("\nhost='web1'\n"));
        assert!(script.contains("# Backup created 2024-05-31T22:00:00Z.\n"));
        assert!(script.contains("-gt 1717286400 ]"));
        assert!(script.contains(
            "wget -q -O '.restorescript-scratch/web1.3.tar.aa.gpg' 'https://s3.invalid/web1.3.tar.aa.gpg?a=1&b=2'\n"
        ));
        assert!(script.contains(
            "gpg --decrypt-files '.restorescript-scratch/web1.3.tar.aa.gpg' '.restorescript-scratch/web1.3.tar.ab.gpg'\n"
        ));
        assert!(script.contains(
            "cat '.restorescript-scratch/web1.3.tar.aa' '.restorescript-scratch/web1.3.tar.ab' | tar -xf -\n"
        ));
        assert!(!script.contains("never finalized"));
    }

    #[test]
    fn test_render_plain_unfinalized() {
        let mut plan = plan(&["web1.3.tar"]);
        plan.finalized = false;
        plan.created = None;
        let script = RestoreScript::new().unwrap().render(&plan).unwrap();
        assert!(!script.contains("gpg"));
        assert!(!script.contains("Backup created"));
        assert!(script.contains("never finalized"));
        assert!(script.contains("cat '.restorescript-scratch/web1.3.tar' | tar -xf -\n"));
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        let script: RestoreScript = "{{ hostname|sh }}".parse().unwrap();
        let mut plan = plan(&[]);
        plan.hostname = "it's".to_string();
        assert_eq!(script.render(&plan).unwrap(), r"'it'\''s'");
    }

    #[test]
    fn test_hostname_is_never_expanded_by_the_shell() {
        let mut plan = plan(&["web1.3.tar"]);
        plan.hostname = "x$(touch pwned)`id`".to_string();
        let script = RestoreScript::new().unwrap().render(&plan).unwrap();
        assert!(script.contains("\nhost='x$(touch pwned)`id`'\n"));
        assert!(script.contains("echo \"Restored $host backup 3.\"\n"));
        assert_eq!(script.matches("$(touch pwned)").count(), 1);
        assert_eq!(script.matches("`id`").count(), 1);
    }

    #[test]
    fn test_custom_template() {
        let script: RestoreScript = "{% for p in parts %}{{ p.key }} {% endfor %}{{ count }}".parse().unwrap();
        assert_eq!(script.render(&plan(&["a.1.tar.aa", "a.1.tar.ab"])).unwrap(), "a.1.tar.aa a.1.tar.ab 2");
    }

    #[test]
    fn test_invalid_template() {
        let err = "{{ unclosed".parse::<RestoreScript>().err().unwrap();
        assert!(matches!(&*err, ErrorKind::Template));
    }
}
