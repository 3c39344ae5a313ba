/// Number of shots in one batch.
pub const POSE_COUNT: usize = 10;

/// Editorial poses, in generation order.
pub const POSES: [&str; POSE_COUNT] = [
    "Full body shot, walking towards the camera with a confident stride (Street Style motion).",
    "Three-quarter shot, standing with hands in pockets or resting on hips, looking slightly away from camera.",
    "Seated pose on a prop (chair or stairs), relaxed posture, highlighting the outfit drapery.",
    "Close-up portrait focus (waist up), intense eye contact, highlighting textures.",
    "Low angle hero shot, standing tall and empowering, looking down at the lens.",
    "Dynamic movement shot, fabric flowing, caught mid-turn or mid-step.",
    "Over-the-shoulder shot, looking back at the camera, showcasing back details or profile.",
    "Leaning against a wall or surface, casual yet chic, one leg crossed over the other.",
    "High angle artistic shot, looking up towards the camera.",
    "Side profile silhouette, highlighting the structural shape of the outfit.",
];

pub fn pose_at(index: usize) -> Option<&'static str> {
    POSES.get(index).copied()
}
