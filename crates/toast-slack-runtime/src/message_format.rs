//! Channel message rendering for captured notifications.

use chrono::Local;
use toast_core::{Notification, RelayContext};

const VENDOR_PREFIXES: [&str; 2] = ["com.squirrel.", "com."];

/// Title-cases `value`: the first letter of every alphabetic run is upper-cased and the
/// remaining letters lower-cased.
pub fn title_case(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut previous_alphabetic = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if previous_alphabetic {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_alphabetic = true;
        } else {
            output.push(ch);
            previous_alphabetic = false;
        }
    }
    output
}

/// Short display name for an application id, e.g. `com.squirrel.slack.slack` -> `Slack`.
pub fn derive_app_name(app_id: &str) -> String {
    let mut name = app_id
        .rsplit_once('.')
        .map_or(app_id, |(_, last)| last)
        .to_string();
    for prefix in VENDOR_PREFIXES {
        name = name.replace(prefix, "");
    }
    title_case(&name)
}

/// Renders the relay message for `notification`.
///
/// ```text
/// ----- {machine} | {region} | {app} | {HH:MM:SS}({offset}) -----
/// {title}
/// {body}
/// ```
///
/// The title line is left out for the placeholder title and the body line when the body
/// is empty. Every line ends with a newline.
pub fn format_message(notification: &Notification, context: &RelayContext) -> String {
    let time_str = notification
        .timestamp
        .with_timezone(&Local)
        .format("%H:%M:%S")
        .to_string();
    render_message(notification, context, &time_str)
}

fn render_message(notification: &Notification, context: &RelayContext, time_str: &str) -> String {
    let mut message = format!(
        "----- {} | {} | {} | {}({}) -----\n",
        context.machine_name,
        context.region,
        derive_app_name(&notification.app_id),
        time_str,
        context.timezone_offset,
    );
    if !notification.title.is_empty() && !notification.has_placeholder_title() {
        message.push_str(&notification.title);
        message.push('\n');
    }
    if !notification.body.is_empty() {
        message.push_str(&notification.body);
        message.push('\n');
    }
    message
}
