//! Demo dataset loaded by `ctrl_init`
//!
//! Ten cameras `CAMERA0..CAMERA9` at `(i, -i)`, persons `1..=500` and cars
//! `AABB10..AABB99` spread round-robin over them, a walk of person `1` and car
//! `AABB10` past every camera, and person `9999` / car `ZZZZ99` seen at
//! `CAMERA1` and then `CAMERA2`. Timestamps step by one second and the last
//! sighting is stamped `now`.

use chrono::{DateTime, Duration, Utc};

use sightline_core::{Camera, Observable, Observation, Result};

use crate::store::LocalStore;

/// Number of demo cameras
pub const DEMO_CAMERAS: usize = 10;
/// Highest demo person id
pub const DEMO_PEOPLE: u64 = 500;

/// Add the demo dataset to `store`. Existing contents are kept.
pub fn populate(store: &mut LocalStore, now: DateTime<Utc>) -> Result<()> {
    let cameras = demo_cameras()?;
    for camera in &cameras {
        store.add_camera(camera.clone())?;
    }

    let sightings = demo_sightings(&cameras)?;
    let first = now - Duration::seconds(sightings.len() as i64 - 1);
    let observations = sightings
        .into_iter()
        .enumerate()
        .map(|(step, (camera, observable))| {
            Observation::new(camera, observable, first + Duration::seconds(step as i64))
        })
        .collect();
    store.add_observations(observations)
}

fn demo_cameras() -> Result<Vec<Camera>> {
    (0..DEMO_CAMERAS)
        .map(|i| Camera::new(format!("CAMERA{i}"), i as f64, -(i as f64)))
        .collect()
}

fn demo_sightings(cameras: &[Camera]) -> Result<Vec<(Camera, Observable)>> {
    let at = |i: usize| cameras[i % cameras.len()].clone();
    let mut sightings = Vec::new();

    for id in 1..=DEMO_PEOPLE {
        sightings.push((at(id as usize), Observable::person(id)));
    }
    for n in 10..100usize {
        sightings.push((at(n), Observable::car(format!("AABB{n}"))?));
    }
    for i in 0..cameras.len() {
        sightings.push((at(i), Observable::person(1)));
        sightings.push((at(i), Observable::car("AABB10")?));
    }
    for i in [1, 2] {
        sightings.push((at(i), Observable::person(9999)));
        sightings.push((at(i), Observable::car("ZZZZ99")?));
    }

    Ok(sightings)
}
