use nanoid::nanoid;

pub fn generate_id() -> String {
    nanoid!(9)
}

pub fn round(x: f64, decimals: u32) -> f64 {
    let y = (10i64).pow(decimals) as f64;
    (x * y).round() / y
}
