//! Prompt text and response schemas for every generation stage.
//!
//! Schemas use the service's OpenAPI subset: upper-case type names, and
//! `minItems`/`maxItems` to pin list lengths.

use adreel_contracts::ads::{AdConcept, AD_COPY_VARIATIONS, HASHTAG_COUNT};
use adreel_contracts::brief::{AspectRatio, UserInput};
use serde_json::{json, Value};

pub const ANALYSIS_SEPARATOR: &str = "\n\n--- Actor analysis ---\n";

pub fn product_analysis() -> String {
    "Analyze this product photo for a short-form video advertisement. Describe the \
     product category, shape, materials, colors, branding and label text, and the \
     qualities a viewer should notice first. Be concrete and concise."
        .to_string()
}

pub fn actor_analysis() -> String {
    "Analyze this photo of the actor who will appear in the advertisement. Describe \
     apparent age range, hair, skin tone, build, clothing and overall look so the \
     same person can be reproduced consistently in a generated scene."
        .to_string()
}

pub fn concept(analysis: &str, input: &UserInput) -> String {
    format!(
        "You are a creative director for {platform} video ads.\n\
         Image analysis:\n{analysis}\n\n\
         Product description: {description}\n\
         Tone: {tone}\n\
         Video length: {length} seconds, aspect ratio {ratio}.\n\n\
         Write one ad concept with a short title, the core idea, a one-paragraph \
         description, and a detailed photorealistic prompt for the opening frame \
         of the video. The opening frame must show the product clearly{actor}.",
        platform = input.platform,
        description = input.description.trim(),
        tone = input.tone.trim(),
        length = input.video_length_s,
        ratio = input.aspect_ratio,
        actor = if input.actor_image.is_some() {
            " together with the actor described above"
        } else {
            ""
        },
    )
}

pub fn opening_frame(frame_prompt: &str, aspect_ratio: AspectRatio) -> String {
    format!(
        "Create a photorealistic {orientation} ({ratio}) opening frame for a video ad.\n\
         {frame_prompt}",
        orientation = orientation(aspect_ratio),
        ratio = aspect_ratio,
    )
}

pub fn actor_frame(frame_prompt: &str, aspect_ratio: AspectRatio) -> String {
    format!(
        "Place the person from the reference photo into this scene, keeping their \
         face and identity exactly as shown. Photorealistic {orientation} ({ratio}) \
         opening frame for a video ad.\n{frame_prompt}",
        orientation = orientation(aspect_ratio),
        ratio = aspect_ratio,
    )
}

pub fn frame_validation(frame_prompt: &str, description: &str) -> String {
    format!(
        "You are the quality-control reviewer for an ad's opening frame.\n\
         Intended scene: {frame_prompt}\n\
         Product: {description}\n\n\
         Check the image against all five criteria:\n\
         1. Framing: nothing important is cut off at the edges.\n\
         2. Product visibility: the product is clearly visible and recognizable.\n\
         3. Anatomy: people, hands and faces are anatomically plausible.\n\
         4. Artifacts: no garbled text, smears, duplicated objects or rendering glitches.\n\
         5. Photorealism: the frame reads as a real photograph.\n\n\
         Set isValid to true only if every criterion passes. Otherwise set it to \
         false and put one concrete instruction in suggestion that fixes the \
         problems on the next attempt.",
        description = description.trim(),
    )
}

pub fn video_script(input: &UserInput, concept: &AdConcept) -> String {
    format!(
        "Write the direction script for a single continuous {length}-second shot \
         for a {platform} ad in a {tone} tone. The video starts from this opening \
         frame: {frame}\n\n\
         Concept: {idea}\n\
         Split the script into explicit time ranges (for example 0-3s) that cover \
         the full {length} seconds without cuts, describe camera movement and \
         action, and show the call to action \"{cta}\" near the end. Return only \
         the script.",
        length = input.video_length_s,
        platform = input.platform,
        tone = input.tone.trim(),
        frame = concept.opening_frame_prompt,
        idea = concept.idea.trim(),
        cta = input.call_to_action.trim(),
    )
}

pub fn voiceover_line(tone: &str, call_to_action: &str) -> String {
    format!("say with a {} tone: {}", tone.trim(), call_to_action.trim())
}

pub fn ad_assets(input: &UserInput) -> String {
    format!(
        "Write social copy for a {platform} video ad.\n\
         Product: {description}\n\
         Call to action: {cta}\n\
         Tone: {tone}\n\n\
         Return exactly {copies} distinct ad copy variations and exactly \
         {tags} hashtags.",
        platform = input.platform,
        description = input.description.trim(),
        cta = input.call_to_action.trim(),
        tone = input.tone.trim(),
        copies = AD_COPY_VARIATIONS,
        tags = HASHTAG_COUNT,
    )
}

pub fn style_analysis() -> String {
    "Describe this reference photo so the scene can be recreated with a different \
     person: pose, framing, outfit, accessories, environment, lighting and camera \
     style. Do not describe the person's identity, face or other physical traits."
        .to_string()
}

pub fn model_synthesis(style_description: &str) -> String {
    format!(
        "Create a new full-body photorealistic photo of the person in the reference \
         headshot, keeping their face exactly as shown, in this scene:\n{}",
        style_description.trim()
    )
}

pub fn concept_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "idea": { "type": "STRING" },
            "description": { "type": "STRING" },
            "openingFramePrompt": { "type": "STRING" },
        },
        "required": ["title", "idea", "description", "openingFramePrompt"],
        "propertyOrdering": ["title", "idea", "description", "openingFramePrompt"],
    })
}

pub fn validation_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "isValid": { "type": "BOOLEAN" },
            "suggestion": { "type": "STRING" },
        },
        "required": ["isValid", "suggestion"],
    })
}

pub fn ad_assets_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "adCopyVariations": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "minItems": AD_COPY_VARIATIONS,
                "maxItems": AD_COPY_VARIATIONS,
            },
            "hashtags": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "minItems": HASHTAG_COUNT,
                "maxItems": HASHTAG_COUNT,
            },
        },
        "required": ["adCopyVariations", "hashtags"],
    })
}

fn orientation(aspect_ratio: AspectRatio) -> &'static str {
    match aspect_ratio {
        AspectRatio::Portrait => "vertical",
        AspectRatio::Landscape => "horizontal",
    }
}

#[cfg(test)]
mod tests {
    use adreel_contracts::brief::Platform;

    use super::*;

    fn brief() -> UserInput {
        UserInput {
            product_image: None,
            actor_image: None,
            description: "Insulated steel bottle".to_string(),
            call_to_action: "Shop now".to_string(),
            platform: Platform::Reels,
            aspect_ratio: AspectRatio::Portrait,
            video_length_s: 12,
            tone: " playful ".to_string(),
            voiceover: true,
        }
    }

    #[test]
    fn voiceover_line_is_tone_then_cta() {
        assert_eq!(
            voiceover_line(" playful", "Shop now "),
            "say with a playful tone: Shop now"
        );
    }

    #[test]
    fn script_prompt_carries_duration_frame_and_cta() {
        let concept = AdConcept {
            title: "t".to_string(),
            idea: "Summit sunrise".to_string(),
            description: "d".to_string(),
            opening_frame_prompt: "Hiker at dawn\n\nCorrection after attempt 1: show label".to_string(),
        };
        let prompt = video_script(&brief(), &concept);
        assert!(prompt.contains("12-second"));
        assert!(prompt.contains("Correction after attempt 1: show label"));
        assert!(prompt.contains("\"Shop now\""));
        assert!(prompt.contains("Instagram Reels"));
    }

    #[test]
    fn validation_prompt_lists_five_criteria() {
        let prompt = frame_validation("Hiker at dawn", "bottle");
        for criterion in ["Framing", "Product visibility", "Anatomy", "Artifacts", "Photorealism"] {
            assert!(prompt.contains(criterion), "missing {criterion}");
        }
    }

    #[test]
    fn asset_schema_pins_list_lengths() {
        let schema = ad_assets_schema();
        assert_eq!(schema["properties"]["adCopyVariations"]["minItems"], json!(3));
        assert_eq!(schema["properties"]["hashtags"]["maxItems"], json!(5));
    }
}
