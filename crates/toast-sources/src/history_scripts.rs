//! PowerShell scripts that read live toast history through the WinRT notification API.
//!
//! Every script prints a JSON array (possibly `[]`) on stdout and exits 0 even when the
//! history API is unsupported, so the caller never has to parse error exits for the
//! common "no history" case.

/// App ids queried one by one when the global history query returns nothing.
pub const KNOWN_HISTORY_APP_IDS: &[&str] = &[
    "com.slack.Slack",
    "slack",
    "Microsoft.Windows.Shell.RunDialog",
    "Microsoft.Windows.Shell.StartMenuExperienceHost",
];

const LOAD_TOAST_MANAGER: &str = r#"Add-Type -AssemblyName System.Runtime.WindowsRuntime
[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null"#;

const CONVERT_TOAST_FUNCTION: &str = r#"function Convert-Toast($toast, $fallbackAppId) {
    $doc = New-Object System.Xml.XmlDocument
    $doc.LoadXml($toast.Content.GetXml())
    $texts = $doc.SelectNodes("//*[local-name()='text']")
    $title = ""
    $body = ""
    if ($texts -and $texts.Count -gt 0) { $title = $texts[0].InnerText }
    if ($texts -and $texts.Count -gt 1) { $body = $texts[1].InnerText }
    $appId = $fallbackAppId
    if ($toast.PSObject.Properties['ApplicationId'] -and $toast.ApplicationId) { $appId = $toast.ApplicationId }
    [ordered]@{
        Id = if ($toast.Id) { [string]$toast.Id } else { "" }
        Group = if ($toast.Group) { [string]$toast.Group } else { "" }
        Tag = if ($toast.Tag) { [string]$toast.Tag } else { "" }
        AppId = $appId
        Title = $title
        Body = $body
    }
}"#;

const EMIT_RESULTS: &str = r#"if ($results.Count -eq 0) { Write-Output "[]" } else { ConvertTo-Json -InputObject @($results) -Compress -Depth 3 }"#;

/// Which history query to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryStrategy {
    /// Full history across every application.
    GlobalHistory,
    /// History scoped to each listed app id, accumulated.
    PerApplication { app_ids: Vec<String> },
}

impl HistoryStrategy {
    /// Per-application strategy over the built-in app ids plus `extra_app_ids`.
    pub fn per_application_with(extra_app_ids: &[String]) -> Self {
        let mut app_ids = KNOWN_HISTORY_APP_IDS
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>();
        for app_id in extra_app_ids {
            let trimmed = app_id.trim();
            if !trimmed.is_empty() && !app_ids.iter().any(|known| known == trimmed) {
                app_ids.push(trimmed.to_string());
            }
        }
        Self::PerApplication { app_ids }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GlobalHistory => "global-history",
            Self::PerApplication { .. } => "per-app-history",
        }
    }

    pub fn render_script(&self) -> String {
        match self {
            Self::GlobalHistory => render_global_history_script(),
            Self::PerApplication { app_ids } => render_per_application_script(app_ids),
        }
    }
}

fn render_global_history_script() -> String {
    format!(
        r#"$ErrorActionPreference = "Stop"
try {{
{LOAD_TOAST_MANAGER}
{CONVERT_TOAST_FUNCTION}
    $history = $null
    try {{
        $history = [Windows.UI.Notifications.ToastNotificationManager]::History.GetHistory()
    }} catch {{
        $message = $_.Exception.Message
        if ($message -notlike "*0x80070490*" -and $message -notlike "*Element not found*") {{
            [Console]::Error.WriteLine("GetHistory failed: $message")
        }}
        Write-Output "[]"
        exit 0
    }}
    $results = @()
    if ($null -ne $history) {{
        foreach ($toast in $history) {{
            try {{ $results += Convert-Toast $toast "Unknown" }} catch {{ continue }}
        }}
    }}
    {EMIT_RESULTS}
}} catch {{
    [Console]::Error.WriteLine("history script error: $($_.Exception.Message)")
    Write-Output "[]"
}}
"#
    )
}

fn render_per_application_script(app_ids: &[String]) -> String {
    let quoted = app_ids
        .iter()
        .map(|app_id| quote_powershell_literal(app_id))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"$ErrorActionPreference = "Stop"
try {{
{LOAD_TOAST_MANAGER}
{CONVERT_TOAST_FUNCTION}
    $results = @()
    foreach ($appId in @({quoted})) {{
        try {{
            $history = [Windows.UI.Notifications.ToastNotificationManager]::History.GetHistory($appId)
            if ($history -and $history.Count -gt 0) {{
                foreach ($toast in $history) {{
                    try {{ $results += Convert-Toast $toast $appId }} catch {{ continue }}
                }}
            }}
        }} catch {{
            continue
        }}
    }}
    {EMIT_RESULTS}
}} catch {{
    Write-Output "[]"
}}
"#
    )
}

/// Script printing `OK` when the history API answers and `ERROR` otherwise.
pub fn render_access_probe_script() -> String {
    format!(
        r#"try {{
{LOAD_TOAST_MANAGER}
    $history = [Windows.UI.Notifications.ToastNotificationManager]::History.GetHistory()
    Write-Output "OK"
}} catch {{
    Write-Output "ERROR"
}}
"#
    )
}

/// Wraps a value in a single-quoted PowerShell literal, doubling embedded quotes.
pub fn quote_powershell_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
