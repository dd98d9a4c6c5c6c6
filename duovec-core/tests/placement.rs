use duovec_core::{is_accelerator_available, zeros, Device, Error, IntoDevice, Vector};

#[test]
fn parse_device_names() {
    assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
    assert_eq!("CUDA".parse::<Device>().unwrap(), Device::Cuda);
    assert_eq!("Cuda".into_device().unwrap(), Device::Cuda);
    assert_eq!(Device::default(), Device::Cpu);
    assert_eq!(Device::Cuda.to_string(), "cuda");
}

#[test]
fn unknown_device_is_rejected() {
    let err = Vector::new(&[1.0f32], "tpu").unwrap_err();
    match err.inner() {
        Error::UnsupportedDevice { device } => assert_eq!(device, "tpu"),
        other => panic!("unexpected error {other:?}"),
    }

    let mut a = Vector::new(&[1.0f32], "cpu").unwrap();
    assert!(a.change_device("metal").is_err());
    assert_eq!(a.device(), Device::Cpu);
}

#[test]
fn cpu_is_always_available() {
    assert!(Device::Cpu.ensure_available().is_ok());
}

#[test]
fn change_device_to_same_placement() {
    let mut a = Vector::new(&[1i64, 2, 3], Device::Cpu).unwrap();
    a.change_device("cpu").unwrap();
    assert_eq!(a.device(), Device::Cpu);
    assert_eq!(a.to_vec().unwrap(), vec![1, 2, 3]);
}

#[cfg(not(feature = "cuda"))]
mod without_accelerator {
    use super::*;

    #[test]
    fn probe_says_no() {
        assert!(!is_accelerator_available().unwrap());
    }

    #[test]
    fn cuda_placement_is_unavailable() {
        let err = Vector::new(&[1.0f64, 2.0], "cuda").unwrap_err();
        assert!(matches!(err.inner(), Error::DeviceUnavailable { device } if device == "cuda"));

        let err = zeros::<u32>(3, Device::Cuda).unwrap_err();
        assert!(matches!(err.inner(), Error::DeviceUnavailable { .. }));
        assert!(duovec_core::rand::<f32>(3, None, "cuda").is_err());
    }

    #[test]
    fn failed_move_leaves_vector_untouched() {
        let mut a = Vector::new(&[1.0f64, 2.0], "cpu").unwrap();
        let err = a.change_device("cuda").unwrap_err();
        assert!(matches!(err.inner(), Error::DeviceUnavailable { .. }));
        assert_eq!(a.device(), Device::Cpu);
        assert_eq!(a.to_vec().unwrap(), vec![1.0, 2.0]);
    }
}

#[cfg(feature = "cuda")]
mod with_accelerator {
    use super::*;

    #[test]
    fn probe_says_yes() {
        assert!(is_accelerator_available().unwrap());
    }

    #[test]
    fn round_trip() {
        let mut a = Vector::new(&[1.0f32, 2.0, 3.0], "cpu").unwrap();
        a.change_device("cuda").unwrap();
        assert_eq!(a.device(), Device::Cuda);
        a.change_device(Device::Cuda).unwrap();
        a.change_device("cpu").unwrap();
        assert_eq!(a.device(), Device::Cpu);
        assert_eq!(a.to_vec().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn mixed_placements_are_rejected() {
        let a = Vector::new(&[1.0f64, 2.0], "cpu").unwrap();
        let b = Vector::new(&[3.0f64, 4.0], "cuda").unwrap();

        let err = (&a + &b).unwrap_err();
        match err.inner() {
            Error::DeviceMismatch { op, lhs, rhs } => {
                assert_eq!(*op, "+");
                assert_eq!(*lhs, Device::Cpu);
                assert_eq!(*rhs, Device::Cuda);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(a.dot(&b).is_err());
        assert!(b.rsub(&a).is_err());
        assert!(a.is_parallel(&b).is_err());
        assert!(a.project_onto(&b).is_err());

        // Norm comparisons read each vector on its own device.
        assert!(!a.eq(&b).unwrap());
    }

    #[test]
    fn bitwise_placements_are_rejected() {
        let a = Vector::new(&[1u8, 2], "cpu").unwrap();
        let b = Vector::new(&[3u8, 4], "cuda").unwrap();
        assert!(matches!(
            (&a & &b).unwrap_err().inner(),
            Error::DeviceMismatch { .. }
        ));
    }
}
