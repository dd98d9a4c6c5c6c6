use duovec_core::{ones, ones_like, rand, rand_like, vector, zeros, zeros_like, Device, Vector};

macro_rules! test_device_dtype {
    ($dtype:ty, $dev:expr, $zero:expr, $one:expr, $full:expr, $dtype_mod:ident) => {
        mod $dtype_mod {
            use super::*;

            #[test]
            fn zeros_fill() {
                let a = zeros::<$dtype>(5, $dev).unwrap();
                assert_eq!(a.len(), 5);
                assert_eq!(a.device(), $dev);
                assert_eq!(a.to_vec().unwrap(), vec![$zero; 5]);
            }

            #[test]
            fn ones_fill() {
                let a = ones::<$dtype>(4, $dev).unwrap();
                assert_eq!(a.to_vec().unwrap(), vec![$one; 4]);
            }

            #[test]
            fn from_components() {
                let a = vector(&[$full, $one, $zero], $dev).unwrap();
                assert_eq!(a.to_vec().unwrap(), vec![$full, $one, $zero]);
            }

            #[test]
            fn like_copies_len_and_device() {
                let a = vector(&[$full, $full, $full], $dev).unwrap();
                let z = zeros_like(&a).unwrap();
                let o = ones_like(&a).unwrap();
                assert_eq!(z.device(), a.device());
                assert_eq!(z.to_vec().unwrap(), vec![$zero; 3]);
                assert_eq!(o.to_vec().unwrap(), vec![$one; 3]);
            }

            #[test]
            fn empty() {
                let a = zeros::<$dtype>(0, $dev).unwrap();
                assert!(a.is_empty());
                assert_eq!(a.to_vec().unwrap(), Vec::<$dtype>::new());
            }
        }
    };
}

test_device_dtype!(f32, Device::Cpu, 0.0, 1.0, std::f32::consts::PI, f32_cpu);
test_device_dtype!(f64, Device::Cpu, 0.0, 1.0, std::f64::consts::PI, f64_cpu);
test_device_dtype!(u8, Device::Cpu, 0, 1, u8::MAX, u8_cpu);
test_device_dtype!(u32, Device::Cpu, 0, 1, u32::MAX, u32_cpu);
test_device_dtype!(i32, Device::Cpu, 0, 1, i32::MIN, i32_cpu);
test_device_dtype!(i64, Device::Cpu, 0, 1, i64::MAX, i64_cpu);

#[cfg(feature = "cuda")]
test_device_dtype!(f32, Device::Cuda, 0.0, 1.0, std::f32::consts::PI, f32_cuda);
#[cfg(feature = "cuda")]
test_device_dtype!(f64, Device::Cuda, 0.0, 1.0, std::f64::consts::PI, f64_cuda);
#[cfg(feature = "cuda")]
test_device_dtype!(u8, Device::Cuda, 0, 1, u8::MAX, u8_cuda);
#[cfg(feature = "cuda")]
test_device_dtype!(u32, Device::Cuda, 0, 1, u32::MAX, u32_cuda);
#[cfg(feature = "cuda")]
test_device_dtype!(i32, Device::Cuda, 0, 1, i32::MIN, i32_cuda);
#[cfg(feature = "cuda")]
test_device_dtype!(i64, Device::Cuda, 0, 1, i64::MAX, i64_cuda);

macro_rules! test_rand {
    ($dev:expr, $name:ident) => {
        mod $name {
            use super::*;

            #[test]
            fn unit_interval() {
                let a = rand::<f32>(2048, None, $dev).unwrap();
                assert_eq!(a.len(), 2048);
                assert!(a.to_vec().unwrap().iter().all(|x| *x >= 0.0 && *x <= 1.0));
            }

            #[test]
            fn seeded_is_reproducible() {
                let a = rand::<f64>(100, Some(42), $dev).unwrap();
                let b = rand::<f64>(100, Some(42), $dev).unwrap();
                let c = rand::<f64>(100, Some(43), $dev).unwrap();
                assert_eq!(a.to_vec().unwrap(), b.to_vec().unwrap());
                assert_ne!(a.to_vec().unwrap(), c.to_vec().unwrap());
            }

            #[test]
            fn like() {
                let a = zeros::<f64>(17, $dev).unwrap();
                let r = rand_like(&a, Some(1)).unwrap();
                assert_eq!(r.len(), 17);
                assert_eq!(r.device(), $dev);
            }
        }
    };
}

test_rand!(Device::Cpu, rand_cpu);
#[cfg(feature = "cuda")]
test_rand!(Device::Cuda, rand_cuda);

#[test]
fn device_names_are_case_insensitive() {
    let a = Vector::new(&[1i32, 2], "CPU").unwrap();
    let b = Vector::new(&[1i32, 2], String::from("Cpu")).unwrap();
    assert_eq!(a.device(), Device::Cpu);
    assert_eq!(b.device(), Device::Cpu);
}

#[test]
fn from_vec_is_on_host() {
    let a = Vector::from_vec(vec![1.5f32, 2.5]);
    assert_eq!(a.device(), Device::Cpu);
    assert_eq!(a.to_vec().unwrap(), vec![1.5, 2.5]);
}
