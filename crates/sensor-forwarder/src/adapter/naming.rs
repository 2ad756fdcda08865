// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hardware-generation prefix naming.
//!
//! Destinations that accept several sensor generations name each item
//! `prefix + suffix`, where the prefix is picked from the combination of
//! kinds present, most specific first:
//!
//! | PM kinds present            | Prefix   |
//! |-----------------------------|----------|
//! | PM1_0, PM2_5, PM4_0, PM10   | `SPS30_` |
//! | PM1_0, PM2_5, PM10          | `PMS_`   |
//! | any other non-empty subset  | `SDS_`   |
//!
//! Meteo kinds get `BME280_` only when humidity, temperature and pressure
//! are all present.

use super::{SensorDataBody, SensorDataValue};
use crate::reading::{MeasurementKind, Reading};

const SPS30: [MeasurementKind; 4] = [
    MeasurementKind::Pm1_0,
    MeasurementKind::Pm2_5,
    MeasurementKind::Pm4_0,
    MeasurementKind::Pm10,
];

const PMS: [MeasurementKind; 3] = [
    MeasurementKind::Pm1_0,
    MeasurementKind::Pm2_5,
    MeasurementKind::Pm10,
];

/// PM prefix, or `None` when the reading carries no PM data.
pub fn pm_prefix(reading: &Reading) -> Option<&'static str> {
    if reading.has_all(&SPS30) {
        Some("SPS30_")
    } else if reading.has_all(&PMS) {
        Some("PMS_")
    } else if MeasurementKind::PARTICULATE.iter().any(|k| reading.has(*k)) {
        Some("SDS_")
    } else {
        None
    }
}

pub fn meteo_prefix(reading: &Reading) -> &'static str {
    if reading.has_all(&MeasurementKind::METEO) {
        "BME280_"
    } else {
        ""
    }
}

/// Prefixed items for every present kind, in emission order.
pub fn prefixed_items(reading: &Reading) -> Vec<SensorDataValue> {
    let pm = pm_prefix(reading).unwrap_or_default();
    let meteo = meteo_prefix(reading);

    reading
        .iter()
        .map(|(kind, value)| {
            let prefix = if kind.is_particulate() { pm } else { meteo };
            SensorDataValue::number(format!("{}{}", prefix, kind.suffix()), value)
        })
        .collect()
}

/// Body with prefixed items under the given software version.
pub fn prefixed_body(reading: &Reading, software_version: &str) -> SensorDataBody {
    SensorDataBody {
        software_version: software_version.to_string(),
        sensordatavalues: prefixed_items(reading),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::reading::MeasurementKind::*;

    fn reading_with(kinds: &[MeasurementKind]) -> Reading {
        kinds
            .iter()
            .enumerate()
            .fold(Reading::new("dev", Utc::now()), |r, (i, k)| r.with(*k, i as f64 + 1.0))
    }

    #[test]
    fn test_pm_prefix_table() {
        assert_eq!(pm_prefix(&reading_with(&[Pm1_0, Pm2_5, Pm4_0, Pm10])), Some("SPS30_"));
        assert_eq!(pm_prefix(&reading_with(&[Pm1_0, Pm2_5, Pm10])), Some("PMS_"));
        assert_eq!(pm_prefix(&reading_with(&[Pm10, Pm2_5])), Some("SDS_"));
        assert_eq!(pm_prefix(&reading_with(&[Pm4_0])), Some("SDS_"));
        assert_eq!(pm_prefix(&reading_with(&[Pm2_5, Pm4_0, Pm10])), Some("SDS_"));
        assert_eq!(pm_prefix(&reading_with(&[Humidity])), None);
    }

    #[test]
    fn test_pm_prefix_all_subsets() {
        // Every non-empty subset of the four PM kinds.
        for mask in 1u8..16 {
            let kinds: Vec<_> = SPS30
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, k)| *k)
                .collect();
            let reading = reading_with(&kinds);
            let expected = match mask {
                0b1111 => "SPS30_",
                0b1011 => "PMS_",
                _ => "SDS_",
            };
            assert_eq!(pm_prefix(&reading), Some(expected), "subset {:?}", kinds);
        }
    }

    #[test]
    fn test_meteo_prefix() {
        assert_eq!(meteo_prefix(&reading_with(&[Humidity, Temperature, Pressure])), "BME280_");
        assert_eq!(meteo_prefix(&reading_with(&[Humidity, Temperature])), "");

        let items = prefixed_items(&reading_with(&[Temperature, Pressure]));
        let names: Vec<_> = items.iter().map(|i| i.value_type.as_str()).collect();
        assert_eq!(names, vec!["temperature", "pressure"]);
    }

    #[test]
    fn test_full_reading_order() {
        let reading = Reading::new("Y", Utc::now())
            .with(Pressure, 1013.0)
            .with(Temperature, 20.0)
            .with(Humidity, 50.0)
            .with(Pm10, 4.0)
            .with(Pm4_0, 3.0)
            .with(Pm2_5, 2.0)
            .with(Pm1_0, 1.0);

        let items = prefixed_items(&reading);
        let pairs: Vec<_> = items
            .iter()
            .map(|i| (i.value_type.as_str(), i.value.to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("SPS30_P1", "4".to_string()),
                ("SPS30_P2", "2".to_string()),
                ("SPS30_P0", "1".to_string()),
                ("SPS30_P4", "3".to_string()),
                ("BME280_humidity", "50".to_string()),
                ("BME280_temperature", "20".to_string()),
                ("BME280_pressure", "1013".to_string()),
            ]
        );
    }

    #[test]
    fn test_pm1_uses_own_value() {
        let reading = reading_with(&[]).with(Pm1_0, 1.5).with(Pm2_5, 9.0).with(Pm10, 20.0);
        let items = prefixed_items(&reading);
        let p0 = items
            .iter()
            .find(|i| i.value_type == "PMS_P0")
            .expect("PMS_P0 item");
        assert_eq!(p0.value, super::super::ItemValue::Number(1.5));
    }

    #[test]
    fn test_empty_reading() {
        let body = prefixed_body(&reading_with(&[]), "v");
        assert!(body.is_empty());
        assert_eq!(body.software_version, "v");
    }
}
