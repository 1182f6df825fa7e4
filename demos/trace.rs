//! Mahony and Madgwick side by side on a recorded motion trace
//!
//! Synthesizes a sensor trace (slow yaw sweep with rocking pitch and roll),
//! writes it to `trace.csv`, reads it back the way a recorded log would be
//! read, runs both filters over it and plots the resulting Euler angles.
//!
//! Run with: `cargo run --example trace`

use mpu9250_ahrs::{Ahrs, Algorithm, Orientation, QuaternionExt};
use nalgebra::{UnitQuaternion, Vector3};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::f64::consts::PI;

#[derive(Debug, Serialize, Deserialize)]
struct SensorData {
    #[serde(rename = "Time (s)")]
    time: f64,
    #[serde(rename = "Gyroscope X (deg/s)")]
    gyro_x: f64,
    #[serde(rename = "Gyroscope Y (deg/s)")]
    gyro_y: f64,
    #[serde(rename = "Gyroscope Z (deg/s)")]
    gyro_z: f64,
    #[serde(rename = "Accelerometer X (g)")]
    accel_x: f64,
    #[serde(rename = "Accelerometer Y (g)")]
    accel_y: f64,
    #[serde(rename = "Accelerometer Z (g)")]
    accel_z: f64,
    #[serde(rename = "Magnetometer X (uT)")]
    mag_x: f64,
    #[serde(rename = "Magnetometer Y (uT)")]
    mag_y: f64,
    #[serde(rename = "Magnetometer Z (uT)")]
    mag_z: f64,
}

const SAMPLE_RATE: f64 = 200.0; // 200 Hz
const DURATION: f64 = 20.0; // seconds
const TRACE_PATH: &str = "trace.csv";
const PLOT_PATH: &str = "trace_plots.png";

/// Earth field, north and down, µT
fn earth_field() -> Vector3<f64> {
    Vector3::new(20.0, 0.0, -40.0)
}

/// True attitude at time `t`
fn attitude(t: f64) -> (f64, f64, f64) {
    let yaw = 120.0 * (2.0 * PI * 0.05 * t).sin();
    let pitch = 20.0 * (2.0 * PI * 0.2 * t).sin();
    let roll = 30.0 * (2.0 * PI * 0.15 * t).cos();
    (yaw, pitch, roll)
}

fn synthesize() -> Vec<SensorData> {
    let dt = 1.0 / SAMPLE_RATE;
    let count = (DURATION * SAMPLE_RATE) as usize;
    let mut samples = Vec::with_capacity(count);

    for i in 0..count {
        let t = i as f64 * dt;
        let (yaw, pitch, roll) = attitude(t);
        let q = UnitQuaternion::from_yaw_pitch_roll(yaw, pitch, roll);
        let (yaw, pitch, roll) = attitude(t + dt);
        let next = UnitQuaternion::from_yaw_pitch_roll(yaw, pitch, roll);

        // Body rate that carries q to next over one sample
        let delta = q.inverse() * next;
        let gyroscope = delta.scaled_axis().map(f64::to_degrees) / dt;
        let accelerometer = q.inverse_transform_vector(&Vector3::z());
        let magnetometer = q.inverse_transform_vector(&earth_field());

        samples.push(SensorData {
            time: t,
            gyro_x: gyroscope.x,
            gyro_y: gyroscope.y,
            gyro_z: gyroscope.z,
            accel_x: accelerometer.x,
            accel_y: accelerometer.y,
            accel_z: accelerometer.z,
            mag_x: magnetometer.x,
            mag_y: magnetometer.y,
            mag_z: magnetometer.z,
        });
    }
    samples
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("Trace example - Mahony and Madgwick on the same sensor log");

    let mut writer = csv::Writer::from_path(TRACE_PATH)?;
    for sample in synthesize() {
        writer.serialize(sample)?;
    }
    writer.flush()?;

    let mut reader = csv::Reader::from_path(TRACE_PATH)?;
    let mut sensor_data = Vec::new();
    for result in reader.deserialize() {
        let record: SensorData = result?;
        sensor_data.push(record);
    }
    println!("Processing {} sensor samples...", sensor_data.len());

    let mut mahony = Ahrs::new();
    let mut madgwick = Ahrs::new();
    let mut truth = Vec::with_capacity(sensor_data.len());
    let mut mahony_angles = Vec::with_capacity(sensor_data.len());
    let mut madgwick_angles = Vec::with_capacity(sensor_data.len());

    for (i, data) in sensor_data.iter().enumerate() {
        let gyroscope = Vector3::new(data.gyro_x, data.gyro_y, data.gyro_z);
        let accelerometer = Vector3::new(data.accel_x, data.accel_y, data.accel_z);
        let magnetometer = Vector3::new(data.mag_x, data.mag_y, data.mag_z);
        let delta_time = if i == 0 {
            1.0 / SAMPLE_RATE
        } else {
            data.time - sensor_data[i - 1].time
        };

        mahony.update(Algorithm::Mahony, gyroscope, accelerometer, magnetometer, delta_time);
        madgwick.update(Algorithm::Madgwick, gyroscope, accelerometer, magnetometer, delta_time);

        let (yaw, pitch, roll) = attitude(data.time + delta_time);
        truth.push(Orientation::new(yaw, pitch, roll));
        mahony_angles.push(mahony.orientation());
        madgwick_angles.push(madgwick.orientation());

        if i % 1000 == 0 {
            let a = mahony.orientation();
            let b = madgwick.orientation();
            println!(
                "Sample {}: mahony=({:.1}°,{:.1}°,{:.1}°) madgwick=({:.1}°,{:.1}°,{:.1}°)",
                i, a.yaw, a.pitch, a.roll, b.yaw, b.pitch, b.roll
            );
        }
    }

    let rms = |angles: &[Orientation]| {
        let sum: f64 = angles
            .iter()
            .zip(&truth)
            .map(|(a, t)| {
                let yaw = wrap(a.yaw - t.yaw);
                yaw * yaw + (a.pitch - t.pitch).powi(2) + wrap(a.roll - t.roll).powi(2)
            })
            .sum();
        (sum / (3.0 * angles.len() as f64)).sqrt()
    };
    println!("RMS error: mahony {:.2}°, madgwick {:.2}°", rms(&mahony_angles), rms(&madgwick_angles));

    println!("Generating plots...");
    create_plots(&sensor_data, &truth, &mahony_angles, &madgwick_angles)?;
    println!("✓ Plots saved to {PLOT_PATH}");
    Ok(())
}

/// Angle difference folded into [-180, 180]
fn wrap(degrees: f64) -> f64 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

/// One panel per Euler angle, truth and both filters overlaid
fn create_plots(
    sensor_data: &[SensorData],
    truth: &[Orientation],
    mahony: &[Orientation],
    madgwick: &[Orientation],
) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new(PLOT_PATH, (1000, 900)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((3, 1));

    let end = sensor_data.last().map_or(DURATION, |d| d.time);
    let angles: [(&str, fn(&Orientation) -> f64); 3] = [
        ("Yaw", |o| o.yaw),
        ("Pitch", |o| o.pitch),
        ("Roll", |o| o.roll),
    ];

    for (panel, (name, angle)) in panels.iter().zip(angles) {
        let mut chart = ChartBuilder::on(panel)
            .caption(name, ("sans-serif", 20))
            .margin(5)
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(0f64..end, -180f64..180f64)?;

        chart.configure_mesh().x_desc("Time (s)").y_desc("Degrees").draw()?;

        let series = [("Truth", truth, BLACK), ("Mahony", mahony, RED), ("Madgwick", madgwick, BLUE)];
        for (label, values, color) in series {
            chart
                .draw_series(LineSeries::new(
                    sensor_data.iter().zip(values).map(|(d, o)| (d.time, angle(o))),
                    &color,
                ))?
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], color));
        }

        chart.configure_series_labels().border_style(BLACK).draw()?;
    }

    root.present()?;
    Ok(())
}
