use pubcrawl_core::Route;
use serde_json::json;

use super::{open_session, print_json, CmdResult};

const REMINDERS: [&str; 5] = [
    "Save local taxi numbers in your phone",
    "Drink water between pubs",
    "Eat a proper meal before starting",
    "Stay with your group",
    "Keep your phone charged",
];

const CONTACTS: [(&str, &str); 4] = [
    ("Police/Ambulance/Fire", "999 or 112"),
    ("Non-emergency police", "101"),
    ("Value Cabs", "028 9080 9080"),
    ("fonaCAB", "028 9033 3333"),
];

fn completed_by(name: Option<&str>) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    match name {
        Some(name) => Ok(open_session()?.participant(name)?.completed_stops),
        None => Ok(Vec::new()),
    }
}

pub fn route(name: Option<&str>) -> CmdResult {
    let route = Route::belfast();
    let completed = completed_by(name)?;
    let stops: Vec<_> = route
        .stops()
        .iter()
        .enumerate()
        .map(|(i, stop)| {
            let mut row = json!({ "order": i + 1, "name": stop.name, "rule": stop.rule });
            if name.is_some() {
                row["completed"] = json!(completed.contains(&stop.name));
            }
            row
        })
        .collect();
    print_json(&json!({
        "stops": stops,
        "total_distance_km": (route.total_distance_km() * 100.0).round() / 100.0,
    }))
}

pub fn map(name: Option<&str>) -> CmdResult {
    let completed = completed_by(name)?;
    print_json(&Route::belfast().geojson(&completed))
}

pub fn safety() -> CmdResult {
    let contacts: Vec<_> = CONTACTS
        .iter()
        .map(|(service, number)| json!({ "service": service, "number": number }))
        .collect();
    print_json(&json!({
        "reminders": REMINDERS,
        "emergency_contacts": contacts,
        "route_distance_km": (Route::belfast().total_distance_km() * 10.0).round() / 10.0,
    }))
}
