//! Banner pattern catalog and selection.

use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, PartialEq, Eq)]
pub struct BannerPattern {
    pub name: &'static str,
    /// Art direction; `{topic}` is replaced with the document title.
    pub direction: &'static str,
}

pub static CATALOG: [BannerPattern; 8] = [
    BannerPattern {
        name: "editorial-photo",
        direction: "A wide editorial photograph that sets the scene for {topic}. Natural light, shallow depth of field.",
    },
    BannerPattern {
        name: "flat-illustration",
        direction: "A flat vector illustration about {topic} with a limited palette and generous negative space.",
    },
    BannerPattern {
        name: "isometric",
        direction: "An isometric 3D scene representing {topic}, soft shadows, clean background.",
    },
    BannerPattern {
        name: "abstract-gradient",
        direction: "An abstract composition of gradients and geometric shapes evoking {topic}.",
    },
    BannerPattern {
        name: "watercolor",
        direction: "A loose watercolor painting inspired by {topic}, muted tones, visible paper texture.",
    },
    BannerPattern {
        name: "line-art",
        direction: "Minimal monoline line art depicting {topic} on an off-white background.",
    },
    BannerPattern {
        name: "collage",
        direction: "A paper-cut collage layering objects associated with {topic}.",
    },
    BannerPattern {
        name: "blueprint",
        direction: "A technical blueprint drawing about {topic}, white lines on deep blue.",
    },
];

pub fn find(name: &str) -> Option<&'static BannerPattern> {
    CATALOG.iter().find(|p| p.name == name)
}

pub fn banner_prompt(pattern: &BannerPattern, title: &str) -> String {
    format!(
        "{} Landscape banner for an article titled \"{}\". No text or lettering in the image.",
        pattern.direction.replace("{topic}", title),
        title
    )
}

/// Picks `needed` distinct patterns at random. Patterns not in `used` come first.
pub fn select_patterns<R: Rng + ?Sized>(
    used: &[&str],
    needed: usize,
    rng: &mut R,
) -> Vec<&'static BannerPattern> {
    let (mut fresh, mut reused): (Vec<&'static BannerPattern>, Vec<&'static BannerPattern>) =
        CATALOG.iter().partition(|p| !used.contains(&p.name));
    fresh.shuffle(rng);
    reused.shuffle(rng);
    fresh.into_iter().chain(reused).take(needed).collect()
}
