use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{ApparelType, ColorChoice, GenerationRequest, SourceImage};

pub const FLAT_LAY_PROPS: [&str; 15] = [
    "jeans",
    "a flower pot",
    "a tree branch",
    "a plain scarf",
    "a plaid scarf",
    "sneakers",
    "a wool cardigan",
    "a hat",
    "glasses",
    "a watch",
    "a gift box",
    "a glass jar",
    "a cup",
    "a flower branch",
    "pampas grass",
];

pub const MIN_PROPS: usize = 2;
pub const MAX_PROPS: usize = 3;

const PRESERVE_DESIGN: &str = "Analyze the apparel in the provided image to identify its color and the graphic design printed on it. These elements must be preserved perfectly.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockupPrompts {
    pub model: String,
    pub flat_lay: String,
}

pub fn build_color_variation_prompt(color_name: &str) -> String {
    format!(
        "Analyze the apparel in the provided image. The design on the apparel must be preserved perfectly. \
        The task is to change ONLY the color of the apparel itself to '{color_name}'. \
        Do not alter the background, any other objects, or the design printed on the apparel. The output must be an image."
    )
}

fn apparel_type_instruction(apparel_type: Option<ApparelType>) -> String {
    match apparel_type {
        Some(t) => format!("The new mockup must feature a '{t}'."),
        None => "The new mockup must feature the same type of apparel as in the original image (e.g., t-shirt, sweater, hoodie).".to_string(),
    }
}

/// Builds the model-worn and flat-lay prompts for one apparel type, or for
/// the type detected from the source image when `apparel_type` is `None`.
pub fn build_mockup_prompts<R: Rng + ?Sized>(
    apparel_type: Option<ApparelType>,
    rng: &mut R,
) -> MockupPrompts {
    let type_clause = apparel_type_instruction(apparel_type);
    let props = draw_random_props(&FLAT_LAY_PROPS, MIN_PROPS, MAX_PROPS, rng);

    let model = format!(
        "{PRESERVE_DESIGN} {type_clause} Create a new, photorealistic mockup image of a person wearing this apparel. \
        The background should be clean and neutral, suitable for an e-commerce product listing."
    );
    let flat_lay = format!(
        "{PRESERVE_DESIGN} {type_clause} Create a new, photorealistic flat-lay mockup image. \
        The apparel should be neatly arranged on a complementary surface (like wood or linen). \
        Add a few tasteful props like {props}. The overall aesthetic should be stylish and professional."
    );
    MockupPrompts { model, flat_lay }
}

/// Shuffles `pool`, keeps between `min` and `max` items (inclusive, capped
/// at the pool size) and renders them as "a, b and c".
pub fn draw_random_props<R: Rng + ?Sized>(
    pool: &[&str],
    min: usize,
    max: usize,
    rng: &mut R,
) -> String {
    assert!(min <= max, "prop bounds inverted: min={min} max={max}");
    let mut shuffled = pool.to_vec();
    shuffled.shuffle(rng);
    let count = rng.gen_range(min..=max).min(shuffled.len());
    shuffled.truncate(count);
    natural_list(&shuffled)
}

pub fn natural_list(items: &[&str]) -> String {
    match items {
        [] => String::new(),
        [only] => only.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

pub fn color_file_name(color: &ColorChoice) -> String {
    format!("{}.png", color.name)
}

fn apparel_suffix(apparel_type: Option<ApparelType>) -> String {
    match apparel_type {
        Some(t) => {
            let slug: String = t
                .label()
                .to_lowercase()
                .chars()
                .map(|c| if c.is_whitespace() { '_' } else { c })
                .collect();
            format!("_{slug}")
        }
        None => String::new(),
    }
}

/// `(model, flat-lay)` output names.
pub fn mockup_file_names(apparel_type: Option<ApparelType>) -> (String, String) {
    let suffix = apparel_suffix(apparel_type);
    (format!("model{suffix}_mockup.png"), format!("flatlay{suffix}_mockup.png"))
}

pub fn color_variation_request(image: &SourceImage, color: &ColorChoice) -> GenerationRequest {
    GenerationRequest {
        source_image: image.clone(),
        prompt: build_color_variation_prompt(color.name),
        output_name: color_file_name(color),
    }
}

/// Model request first, flat-lay second.
pub fn mockup_requests<R: Rng + ?Sized>(
    image: &SourceImage,
    apparel_type: Option<ApparelType>,
    rng: &mut R,
) -> [GenerationRequest; 2] {
    let prompts = build_mockup_prompts(apparel_type, rng);
    let (model_name, flat_lay_name) = mockup_file_names(apparel_type);
    [
        GenerationRequest { source_image: image.clone(), prompt: prompts.model, output_name: model_name },
        GenerationRequest { source_image: image.clone(), prompt: prompts.flat_lay, output_name: flat_lay_name },
    ]
}
