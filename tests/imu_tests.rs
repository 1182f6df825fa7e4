mod common;

use approx::assert_abs_diff_eq;
use common::{NoopDelay, SimulatedImu};
use embedded_hal::i2c::ErrorKind;
use mpu9250_ahrs::{
    Algorithm, Error, Imu, MPU9250_ADDRESS, MagResolution, Mpu9250, QuaternionExt, ScaleProfile,
};
use nalgebra::{UnitQuaternion, Vector3};

/// Level sensor whose field points north and down once aligned
fn level_sensor() -> SimulatedImu {
    let mut sim = SimulatedImu::new();
    sim.accel = Vector3::new(0, 0, 16384);
    sim.gyro = Vector3::zeros();
    // AK8963 axes: x and y swapped, z reversed
    sim.mag = Vector3::new(0, 133, 267);
    sim
}

fn imu(sim: SimulatedImu) -> Imu<SimulatedImu> {
    let mut sensor = Mpu9250::new(sim, MPU9250_ADDRESS);
    sensor.init(&mut NoopDelay, ScaleProfile::default()).unwrap();
    Imu::new(sensor)
}

#[test]
fn test_acquire_aligns_magnetometer() {
    let mut sim = level_sensor();
    sim.mag = Vector3::new(100, 200, 300);
    sim.temperature = 0;
    let mut imu = imu(sim);

    assert!(imu.acquire().unwrap());
    assert_eq!(imu.samples(), 1);

    let resolution = MagResolution::Bits16.resolution();
    assert_abs_diff_eq!(imu.mag(), Vector3::new(200.0, 100.0, -300.0) * resolution, epsilon = 1e-12);
    assert_abs_diff_eq!(imu.accel(), Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    assert_abs_diff_eq!(imu.temperature(), 21.0, epsilon = 1e-12);
}

#[test]
fn test_update_waits_for_data_ready() {
    let mut sim = level_sensor();
    sim.data_ready = false;
    let mut imu = imu(sim);

    assert!(!imu.acquire().unwrap());
    imu.update(Algorithm::Mahony, 1_000).unwrap();
    imu.update(Algorithm::Mahony, 6_000).unwrap();

    assert_eq!(imu.samples(), 0);
    assert_eq!(imu.accel(), Vector3::zeros());
    assert_eq!(imu.quaternion(), UnitQuaternion::identity());
    assert_eq!(imu.ahrs().flags().uncorrected_updates, 1);
}

#[test]
fn test_update_propagates_bus_failure() {
    let mut sim = level_sensor();
    sim.fail = true;
    let mut imu = Imu::new(Mpu9250::new(sim, MPU9250_ADDRESS));

    let result = imu.update(Algorithm::Madgwick, 0);
    assert!(matches!(result, Err(Error::Bus(ErrorKind::Bus))));
}

#[test]
fn test_pipeline_converges_to_level_north() {
    for algorithm in [Algorithm::Mahony, Algorithm::Madgwick] {
        let mut imu = imu(level_sensor());
        imu.ahrs_mut()
            .set_quaternion(UnitQuaternion::from_yaw_pitch_roll(30.0, 10.0, -15.0));

        for step in 0..2_000u64 {
            imu.update(algorithm, 1_000 + step * 5_000).unwrap();
        }

        let orientation = imu.orientation();
        assert_abs_diff_eq!(orientation.yaw, 0.0, epsilon = 1.0);
        assert_abs_diff_eq!(orientation.pitch, 0.0, epsilon = 1.0);
        assert_abs_diff_eq!(orientation.roll, 0.0, epsilon = 1.0);
        assert_eq!(imu.samples(), 2_000);
    }
}
