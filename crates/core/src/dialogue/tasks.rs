use serde::{Deserialize, Serialize};

use crate::domain::entitlement::UsageCategory;
use crate::domain::session::Stage;

/// Single-input generation tasks. Entering one parks the session in its stage; the next
/// text message becomes the task input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationTask {
    QuickAnalyze,
    QuickStrategy,
    QuickContentPlan,
    QuickChannels,
    GenImage,
    GenReels,
    GenVideo,
    GenPresentation,
    ReelsIdeas,
    Headlines,
    Posts,
    ContentPlan14,
    Banners,
}

impl GenerationTask {
    pub const ALL: [GenerationTask; 13] = [
        Self::QuickAnalyze,
        Self::QuickStrategy,
        Self::QuickContentPlan,
        Self::QuickChannels,
        Self::GenImage,
        Self::GenReels,
        Self::GenVideo,
        Self::GenPresentation,
        Self::ReelsIdeas,
        Self::Headlines,
        Self::Posts,
        Self::ContentPlan14,
        Self::Banners,
    ];

    pub fn stage(self) -> Stage {
        match self {
            Self::QuickAnalyze => Stage::QuickAnalyze,
            Self::QuickStrategy => Stage::QuickStrategy,
            Self::QuickContentPlan => Stage::QuickContentPlan,
            Self::QuickChannels => Stage::QuickChannels,
            Self::GenImage => Stage::GenImage,
            Self::GenReels => Stage::GenReels,
            Self::GenVideo => Stage::GenVideo,
            Self::GenPresentation => Stage::GenPresentation,
            Self::ReelsIdeas => Stage::CopyReelsIdeas,
            Self::Headlines => Stage::CopyHeadlines,
            Self::Posts => Stage::CopyPosts,
            Self::ContentPlan14 => Stage::CopyContentPlan,
            Self::Banners => Stage::CopyBanners,
        }
    }

    pub fn for_stage(stage: Stage) -> Option<Self> {
        Self::ALL.into_iter().find(|task| task.stage() == stage)
    }

    pub fn category(self) -> UsageCategory {
        match self {
            Self::GenImage => UsageCategory::Images,
            Self::GenReels | Self::GenVideo | Self::ReelsIdeas => UsageCategory::Video,
            Self::GenPresentation => UsageCategory::Presentations,
            _ => UsageCategory::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.stage().as_str()
    }

    /// Shown on entry, after the entry-time access check.
    pub fn intro(self) -> &'static str {
        match self {
            Self::QuickAnalyze => {
                "In one sentence: what do you sell, to whom, and through which channels right now?"
            }
            Self::QuickStrategy => "Describe your goal for 30-90 days and the budget range.",
            Self::QuickContentPlan => {
                "What is the niche and the key product? Name the platform (Telegram, Instagram, VK, YouTube)."
            }
            Self::QuickChannels => "Who is the target audience and what is the average order value?",
            Self::GenImage => {
                "Describe the task: product or service, audience, emotion and style. I'll write ready-to-use image prompts and captions."
            }
            Self::GenReels => {
                "Name the niche or product and the platform. I'll write 5 Reels/Shorts scripts with a hook line and storyboard."
            }
            Self::GenVideo => {
                "What is the product and the goal of the video? The script will run up to 3 minutes with lines and a shot plan."
            }
            Self::GenPresentation => {
                "What is the presentation about and who is the audience? I'll give a structure of up to 20 slides with key points."
            }
            Self::ReelsIdeas => {
                "Describe the product or service and the platform. I'll give 10 ideas with hook lines."
            }
            Self::Headlines => "What is the topic? I'll give 20 headlines in 4 styles.",
            Self::Posts => "Topic or offer and platform (Telegram, Instagram, VK, marketplace)?",
            Self::ContentPlan14 => "Niche, goal (sales, reach, expertise) and platform?",
            Self::Banners => {
                "Product, special offer and audience. I'll give 8 value propositions in 4 formats."
            }
        }
    }

    pub fn prompt(self, input: &str) -> String {
        let instruction = match self {
            Self::QuickAnalyze => {
                "Run an express analysis of the company and find 5 growth points. \
                 Format: 1) Short summary 2) Growth points 3) Quick actions for 7 days 4) Metrics.\nInput:"
            }
            Self::QuickStrategy => {
                "Outline a 90-day strategy: goals, channels, hypotheses, weekly milestones, risks, metrics. Given:"
            }
            Self::QuickContentPlan => {
                "Build a 2-week content plan: 14 posts or videos, each with an idea, key points, CTA and metric. Given:"
            }
            Self::QuickChannels => {
                "Pick 5 traffic channels with reasoning, starting budget, first steps and main risks. Given:"
            }
            Self::GenImage => {
                "Write 4 detailed descriptions for image generation models: each scene lists key objects, \
                 mood and composition, plus a caption with a CTA. Input:"
            }
            Self::GenReels => {
                "Write 5 Reels/Shorts scripts: hook, 3-4 plot beats, final CTA, up to 35 seconds. Given:"
            }
            Self::GenVideo => {
                "Write a video script of up to 3 minutes: intro, a main block of 4-5 scenes, final offer. \
                 Add timecodes, visual cues and the host's lines. Given:"
            }
            Self::GenPresentation => {
                "Plan a presentation of up to 20 slides: title, goal, key points, CTA. \
                 Name key figures or the offer, suggest visual cues and speaker notes. Input:"
            }
            Self::ReelsIdeas => {
                "Write 10 Reels/Shorts ideas: hook, a 3-step plot, final CTA, up to 30 seconds. Input:"
            }
            Self::Headlines => {
                "Write 20 headlines: 5 informational, 5 benefit, 5 trigger, 5 problem-focused. Topic:"
            }
            Self::Posts => {
                "Write 3 variants of a post or description: short, detailed, selling. Add a CTA and emoji. Topic:"
            }
            Self::ContentPlan14 => {
                "Lay out a 14-day plan as a table: format, idea, key points, CTA, target metric. Input:"
            }
            Self::Banners => {
                "Write 8 banner texts: short (up to 6 words), offer plus pain, urgency, social proof. Given:"
            }
        };
        format!("{instruction} {}", input.trim())
    }
}

pub const AUTOMATION_ROADMAP_PROMPT: &str =
    "Give a roadmap for adopting AI in a small or medium business: content, sales, support, \
     analytics, alerts, integrations. Format: stages (2 weeks, 30 days, 60 days), tools, metrics, risks.";

#[cfg(test)]
mod tests {
    use super::GenerationTask;
    use crate::domain::entitlement::UsageCategory;

    #[test]
    fn every_task_maps_to_a_unique_stage() {
        for task in GenerationTask::ALL {
            assert_eq!(GenerationTask::for_stage(task.stage()), Some(task));
            assert!(!task.stage().is_strict_flow());
        }
    }

    #[test]
    fn content_tasks_are_metered() {
        assert_eq!(GenerationTask::GenImage.category(), UsageCategory::Images);
        assert_eq!(GenerationTask::GenVideo.category(), UsageCategory::Video);
        assert_eq!(GenerationTask::ReelsIdeas.category(), UsageCategory::Video);
        assert_eq!(GenerationTask::GenPresentation.category(), UsageCategory::Presentations);
        assert_eq!(GenerationTask::Headlines.category(), UsageCategory::Text);
    }

    #[test]
    fn prompt_embeds_trimmed_input() {
        let prompt = GenerationTask::QuickChannels.prompt("  B2B SaaS, 50k  ");
        assert!(prompt.starts_with("Pick 5 traffic channels"));
        assert!(prompt.ends_with("Given: B2B SaaS, 50k"));
    }
}
