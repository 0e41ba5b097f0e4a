use rand::Rng;
use smart_leds::RGB8;

/// Attempts made to find a color that keeps its distance to the palette.
const MAX_ATTEMPTS: usize = 64;

/// Fully saturated color for `hue` degrees.
pub fn hsv_to_rgb(hue: f32) -> RGB8 {
    let h = hue.rem_euclid(360.0) / 60.0;
    let c = 1.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        5 => (c, 0.0, x),
        _ => (0.0, 0.0, 0.0),
    };

    RGB8::new(
        (r * 255.0_f32).round() as u8,
        (g * 255.0_f32).round() as u8,
        (b * 255.0_f32).round() as u8,
    )
}

/// Hue in degrees, `None` for black, white and greys.
pub fn hue_of(color: RGB8) -> Option<f32> {
    let r = f32::from(color.r) / 255.0;
    let g = f32::from(color.g) / 255.0;
    let b = f32::from(color.b) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    if delta <= f32::EPSILON {
        return None;
    }

    let hue = if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    Some(hue)
}

fn hue_distance(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

/// Random saturated color whose hue is at least `min_distance` degrees away
/// from every colored entry of `others`.
///
/// Gives up after a bounded number of attempts and returns the last candidate,
/// so a crowded palette still gets a color.
pub fn random_color<R, I>(rng: &mut R, others: I, min_distance: f32) -> RGB8
where
    R: Rng,
    I: IntoIterator<Item = RGB8>,
{
    let taken = others.into_iter().filter_map(hue_of).collect::<Vec<f32>>();

    let mut candidate = 0.0;
    for _ in 0..MAX_ATTEMPTS {
        candidate = rng.gen_range(0.0..360.0);
        if taken
            .iter()
            .all(|hue| hue_distance(*hue, candidate) >= min_distance)
        {
            break;
        }
    }

    tracing::trace!(hue = candidate, "Picked random color");
    hsv_to_rgb(candidate)
}
