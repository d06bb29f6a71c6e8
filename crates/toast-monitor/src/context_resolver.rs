//! Machine and region labels resolved once at startup.

use toast_core::RelayContext;
use tracing::debug;

pub const UNKNOWN_REGION: &str = "Unknown";
const UNKNOWN_HOST: &str = "unknown-host";

/// Windows GeoIDs from the Table of Geographical Locations. 234, 81, 110 and 195 are
/// not GB, DE, JP and AU, so those ids are deliberately absent.
const GEO_ID_COUNTRIES: &[(u32, &str)] = &[
    (244, "US"),
    (39, "CA"),
    (242, "GB"),
    (94, "DE"),
    (84, "FR"),
    (122, "JP"),
    (45, "CN"),
    (12, "AU"),
];

/// Raw region inputs, gathered once so resolution stays a pure function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionProbe {
    pub override_region: Option<String>,
    pub timezone_name: Option<String>,
    pub geo_id: Option<u32>,
    pub locale: Option<String>,
}

impl RegionProbe {
    /// Reads the host timezone name, platform geo id and locale.
    pub fn gather(override_region: Option<String>) -> Self {
        Self {
            override_region,
            timezone_name: iana_time_zone::get_timezone().ok(),
            geo_id: read_geo_id(),
            locale: read_locale(),
        }
    }
}

#[cfg(windows)]
fn read_geo_id() -> Option<u32> {
    use winreg::enums::HKEY_CURRENT_USER;
    use winreg::RegKey;

    let geo = RegKey::predef(HKEY_CURRENT_USER)
        .open_subkey(r"Control Panel\International\Geo")
        .ok()?;
    let nation: String = geo.get_value("Nation").ok()?;
    nation.trim().parse().ok()
}

#[cfg(not(windows))]
fn read_geo_id() -> Option<u32> {
    None
}

fn read_locale() -> Option<String> {
    pick_locale(sys_locale::get_locale(), || std::env::var("LANGUAGE").ok())
}

/// The OS-reported locale (`en-US` on Windows), else the environment fallback.
fn pick_locale(
    system_locale: Option<String>,
    env_fallback: impl FnOnce() -> Option<String>,
) -> Option<String> {
    let usable = |value: String| {
        let value = value.trim().to_string();
        (!value.is_empty()).then_some(value)
    };
    system_locale.and_then(usable).or_else(|| env_fallback().and_then(usable))
}

/// Maps an IANA timezone name onto a coarse region label.
pub fn region_from_timezone(timezone_name: &str) -> Option<String> {
    let name = timezone_name.trim();
    if name.is_empty() {
        return None;
    }
    let region = if name.contains("America") {
        if name.contains("New_York") || name.contains("Toronto") {
            "US-East"
        } else if name.contains("Chicago") {
            "US-Central"
        } else if name.contains("Denver") {
            "US-Mountain"
        } else if name.contains("Los_Angeles") || name.contains("Vancouver") {
            "US-West"
        } else {
            "US"
        }
    } else if name.contains("Europe") {
        "Europe"
    } else if name.contains("Asia") {
        if name.contains("Tokyo") {
            "Japan"
        } else if name.contains("Shanghai") || name.contains("Beijing") {
            "China"
        } else if name.contains("Singapore") {
            "Singapore"
        } else {
            "Asia"
        }
    } else if name.contains("Australia") {
        "Australia"
    } else {
        let last = name.rsplit('/').next().unwrap_or(name).replace('_', "-");
        return (!last.is_empty()).then_some(last);
    };
    Some(region.to_string())
}

pub fn country_from_geo_id(geo_id: u32) -> Option<&'static str> {
    GEO_ID_COUNTRIES
        .iter()
        .find(|(id, _)| *id == geo_id)
        .map(|(_, country)| *country)
}

/// Country part of a locale such as `en_US.UTF-8`; the whole locale when it has no
/// separator. `C` and `POSIX` carry no region.
pub fn country_from_locale(locale: &str) -> Option<String> {
    let base = locale
        .split(['.', '@'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "C" || base == "POSIX" {
        return None;
    }
    match base.split_once(['_', '-']) {
        Some((_, country)) if !country.is_empty() => Some(country.to_string()),
        Some(_) => None,
        None => Some(base.to_string()),
    }
}

/// First label produced by: override, timezone, geo id, locale. Falls back to `Unknown`.
pub fn resolve_region(probe: &RegionProbe) -> String {
    if let Some(region) = probe
        .override_region
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return region.to_string();
    }
    if let Some(region) = probe.timezone_name.as_deref().and_then(region_from_timezone) {
        return region;
    }
    if let Some(country) = probe.geo_id.and_then(country_from_geo_id) {
        return country.to_string();
    }
    if let Some(country) = probe.locale.as_deref().and_then(country_from_locale) {
        return country;
    }
    UNKNOWN_REGION.to_string()
}

pub fn resolve_machine_name(override_name: Option<&str>) -> String {
    override_name
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(sysinfo::System::host_name)
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

pub fn resolve_relay_context(
    machine_override: Option<&str>,
    region_override: Option<String>,
) -> RelayContext {
    let probe = RegionProbe::gather(region_override);
    debug!(?probe, "gathered region probe");
    RelayContext::new(resolve_machine_name(machine_override), resolve_region(&probe))
}
