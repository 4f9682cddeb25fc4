//! Default model prompts. Each can be overridden under `features` in the config.

pub(crate) const ANALYSIS_PROMPT: &str = "Artifact Recognition:
1. Identify its name, origin, and cultural context.
2. Analyze the artifact for localized cultural information based on its specific region of origin.
3. Estimate the artifact's age and provide a probability of its authenticity, including verification for any potential counterfeit indicators.";

pub(crate) const RESTORATION_PROMPT: &str = "Restore this historical artifact image. Remove all damage, deterioration, and aging effects while maintaining historical accuracy and authenticity. Enhance quality and preserve original details.";

/// `{artifact_name}` is replaced with the name the client sent.
pub(crate) const CLIMATE_PROMPT_TEMPLATE: &str = "For {artifact_name}, fetch the climatic conditions of the artifact's location, including temperature, humidity, UV exposure, and air quality. Perform a climate impact analysis, assess the risk to the artifact's preservation, and provide preventive care guidelines.";

pub(crate) const ARTIFACT_NAME_PLACEHOLDER: &str = "{artifact_name}";

#[must_use]
pub(crate) fn climate_prompt(template: Option<&str>, artifact_name: &str) -> String {
    template
        .unwrap_or(CLIMATE_PROMPT_TEMPLATE)
        .replace(ARTIFACT_NAME_PLACEHOLDER, artifact_name)
}
