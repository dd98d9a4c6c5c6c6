use duovec_core::{is_accelerator_available, ones, Vector};

fn main() {
    let device = if is_accelerator_available().unwrap() {
        "cuda"
    } else {
        "cpu"
    };

    let a = Vector::new(&[3.0f32, 4.0, 0.0], device).unwrap();
    let b = ones::<f32>(3, device).unwrap();
    println!("{a}");

    let c = (&(&a * 2.0).unwrap() + &b).unwrap();
    dbg!(c.to_vec().unwrap());
    dbg!(a.dot(&b).unwrap(), a.norm().unwrap());
    dbg!(a.unit().unwrap().to_vec().unwrap());

    let mut c = c;
    c.change_device("cpu").unwrap();
    assert_eq!(c.to_vec().unwrap(), vec![7.0, 9.0, 1.0]);
}
