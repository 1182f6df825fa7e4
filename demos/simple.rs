use mpu9250_ahrs::{Ahrs, Algorithm};
use nalgebra::Vector3;

const SAMPLE_PERIOD: f64 = 0.005; // 5 ms sample period

fn main() {
    let mut ahrs = Ahrs::new();

    for _ in 0..10 {
        // this loop should repeat each time new sensor data is available
        let gyroscope = Vector3::new(0.0, 0.0, 0.0); // replace this with actual gyroscope data in degrees/s
        let accelerometer = Vector3::new(0.0, 0.0, 1.0); // replace this with actual accelerometer data in g
        let magnetometer = Vector3::new(20.0, 0.0, -40.0); // replace this with actual magnetometer data in uT

        ahrs.update(Algorithm::Mahony, gyroscope, accelerometer, magnetometer, SAMPLE_PERIOD);

        let orientation = ahrs.orientation();
        println!(
            "Yaw: {:.2}, Pitch: {:.2}, Roll: {:.2}",
            orientation.yaw, orientation.pitch, orientation.roll
        );
    }
}
