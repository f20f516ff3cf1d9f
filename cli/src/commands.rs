//! Line-oriented stdin commands for `staleguard watch`.
//!
//! Each line stands in for something a browser page would report, so the
//! resilience layer can be exercised by hand or from a script.

use staleguard_engine::PlatformEvent;
use staleguard_types::{Action, ActivityEvent, LoadFailure, ModuleKey, ResourceErrorEvent, Visibility};

pub const HELP: &str = "\
commands:
  activity | key | scroll     user input
  online | offline            network state
  hide | show                 page visibility
  route                       navigation
  reject <message>            unhandled promise rejection
  script <url>                failed <script> load
  loaded <key>                module loaded after a failure
  dismiss | reload | retry    notification actions";

/// Parse one input line. Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<PlatformEvent>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let event = match word.to_ascii_lowercase().as_str() {
        "activity" | "click" => PlatformEvent::Activity(ActivityEvent::Click),
        "key" => PlatformEvent::Activity(ActivityEvent::KeyDown),
        "scroll" => PlatformEvent::Activity(ActivityEvent::Scroll),
        "online" => PlatformEvent::Activity(ActivityEvent::Online),
        "offline" => PlatformEvent::Activity(ActivityEvent::Offline),
        "hide" => PlatformEvent::Visibility(Visibility::Hidden),
        "show" => PlatformEvent::Visibility(Visibility::Visible),
        "route" => PlatformEvent::RouteChanged,
        "reject" => PlatformEvent::UnhandledRejection(LoadFailure::new(required(word, rest)?)),
        "script" => PlatformEvent::ResourceError(ResourceErrorEvent::script(required(word, rest)?)),
        "loaded" => PlatformEvent::ChunkLoaded(ModuleKey::new(required(word, rest)?)),
        "dismiss" => PlatformEvent::UserAction(Action::Dismiss),
        "reload" => PlatformEvent::UserAction(Action::Reload),
        "retry" => PlatformEvent::UserAction(Action::SoftRetry),
        other => return Err(format!("unknown command `{other}`")),
    };
    Ok(Some(event))
}

fn required<'a>(word: &str, rest: &'a str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("`{word}` needs an argument"))
    } else {
        Ok(rest)
    }
}
