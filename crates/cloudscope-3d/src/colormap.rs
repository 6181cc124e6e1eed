/// Map a value in `[0, 1]` to an RGB color on the HSV hue ramp from blue to red.
///
/// `0` maps to blue, `0.5` to green and `1` to red, at full saturation and
/// value. Inputs outside `[0, 1]` are clamped.
///
/// Example:
/// ```
/// use cloudscope_3d::colormap::gradient_hsv;
///
/// assert_eq!(gradient_hsv(0.0), [0.0, 0.0, 1.0]);
/// assert_eq!(gradient_hsv(1.0), [1.0, 0.0, 0.0]);
/// ```
pub fn gradient_hsv(value: f64) -> [f32; 3] {
    let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };

    // hue in degrees, 240 is blue and 0 is red
    let h = 240.0 * (1.0 - value) / 60.0;
    let sector = h.floor();
    let f = (h - sector) as f32;

    // saturation and value are 1, so p = 0, q = 1 - f, t = f
    let (q, t) = (1.0 - f, f);
    match sector as u32 {
        1 => [q, 1.0, 0.0],
        2 => [0.0, 1.0, t],
        3 => [0.0, q, 1.0],
        4 => [t, 0.0, 1.0],
        5 => [1.0, 0.0, q],
        _ => [1.0, t, 0.0],
    }
}
