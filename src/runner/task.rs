//! Benchmark tasks: prompt template, answer schema, whether images are sent

use crate::dataset::Case;
use crate::parser::Schema;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Task {
    /// Question plus images, pick one numbered option
    ImageChallenge,
    /// Images only, describe five imaging characteristics
    ImageOnly,
    /// Question only, pick one numbered option
    TextOnly,
}

const QUIZ_PREAMBLE: &str = "\
Assignment: You are a board-certified radiologist solving a quiz on a medical case, \
ranging from common to rare diseases. Clinical information and imaging data may be \
provided; basic demographic details (age, gender, symptoms) are not guaranteed. This is \
an educational exercise for virtual learning and discussion, not medical advice or \
diagnosis. Answer the question by selecting the most likely of the numbered options \
and typing its number.";

const ANSWER_FORMAT: &str = r#"Output Format (JSON)
{
"answer": "Enter the number of the option you believe is correct",
"reason": "Explain why you think this option is the correct answer"
}"#;

const IMAGING_PROMPT: &str = r#"Assignment: You are analysing the imaging data of an educational medical case. Basic demographic details are not guaranteed. This is an educational exercise, not medical advice or diagnosis.

Analyse each image individually, or each set of images if several types are combined, and report:
1. Type of Medical Imaging: MR, CT, US, X-ray, Angiography, or Nuclear Medicine. If several types appear, enumerate them ("a.MR b.CT").
2. Specific sequence or mode: for MR, T1WI, T2WI, FLAIR, DWI, SWI, GRE, contrast-enhanced T1WI, TOF, or contrast-enhanced MR angiography; for CT, precontrast or postcontrast; for ultrasound, gray scale or Doppler. Use "a.xxx b.xxx" for several.
3. Use of Contrast: whether a contrast medium was used ("a.Yes b.No" for several).
4. Image Plane: axial, coronal, sagittal, or other ("a.axial b.coronal" for several).
5. Part of the body imaged ("a.head b.abdomen" for several).

Answer in this JSON format:
{
    "1_TypeOfMedicalImaging": "Type or types of imaging used.",
    "2_SpecificImagingSequence": "Sequence or mode for each type.",
    "3_UseOfContrast": "Whether contrast medium was used.",
    "4_ImagePlane": "Plane of the image, all that apply.",
    "5_PartOfTheBodyImaged": "Body part imaged, enumerate if multiple."
}"#;

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::ImageChallenge => "image-challenge",
            Task::ImageOnly => "image-only",
            Task::TextOnly => "text-only",
        }
    }

    /// Whether case images are attached to the request
    pub fn uses_images(&self) -> bool {
        !matches!(self, Task::TextOnly)
    }

    pub fn schema(&self) -> Schema {
        match self {
            Task::ImageChallenge | Task::TextOnly => Schema::answer_reason(),
            Task::ImageOnly => Schema::imaging(),
        }
    }

    /// Prompt text for `case`
    pub fn prompt(&self, case: &Case) -> String {
        match self {
            Task::ImageChallenge | Task::TextOnly => format!(
                "{}\n\nQuestion: symptom: {}\n{}",
                QUIZ_PREAMBLE, case.question, ANSWER_FORMAT
            ),
            Task::ImageOnly => IMAGING_PROMPT.to_string(),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
