//! Skeletal animation
//!
//! A [`Skeleton`] stores bones parents-first, so a single forward sweep
//! computes every global transform. An [`AnimationClip`] holds keyframe
//! channels addressed by bone name, and [`Skinning`] ties both to the
//! per-vertex bone influences of a model.

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};

use crate::error::{RendererError, RendererResult};
use crate::renderer::constants::MAX_NUM_BONES;
use crate::resources::AnimationData;

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    /// Mesh space to bone space
    pub offset: Mat4,
    /// Local transform used when no animation channel drives the bone
    pub bind_local: Mat4,
}

#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    global_inverse: Mat4,
}

impl Skeleton {
    pub fn new(global_inverse: Mat4) -> Self {
        Self {
            bones: Vec::new(),
            global_inverse,
        }
    }

    /// Append a bone and return its index.
    ///
    /// Returns `None` when `parent` does not name an earlier bone.
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        offset: Mat4,
        bind_local: Mat4,
    ) -> Option<usize> {
        if parent.is_some_and(|p| p >= self.bones.len()) {
            return None;
        }
        self.bones.push(Bone {
            name: name.into(),
            parent,
            offset,
            bind_local,
        });
        Some(self.bones.len() - 1)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name == name)
    }

    pub fn global_inverse(&self) -> Mat4 {
        self.global_inverse
    }

    /// Final skinning matrices: `global_inverse * global * offset` per bone.
    pub fn pose(&self, local: impl Fn(usize, &Bone) -> Mat4) -> Vec<Mat4> {
        let mut globals: Vec<Mat4> = Vec::with_capacity(self.bones.len());
        for (i, bone) in self.bones.iter().enumerate() {
            let parent = bone.parent.map_or(Mat4::IDENTITY, |p| globals[p]);
            globals.push(parent * local(i, bone));
        }
        self.bones
            .iter()
            .zip(&globals)
            .map(|(bone, global)| self.global_inverse * *global * bone.offset)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe<T> {
    /// Time in ticks
    pub time: f32,
    pub value: T,
}

impl<T> Keyframe<T> {
    pub fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

/// Find the bracketing keys of `time` and the blend factor between them
fn bracket<T: Copy>(keys: &[Keyframe<T>], time: f32) -> Option<(T, T, f32)> {
    let first = keys.first()?;
    if keys.len() == 1 || time <= first.time {
        return Some((first.value, first.value, 0.0));
    }
    let next = keys.iter().position(|key| key.time > time);
    match next {
        Some(n) => {
            let (a, b) = (&keys[n - 1], &keys[n]);
            let span = b.time - a.time;
            let factor = if span > 0.0 { (time - a.time) / span } else { 0.0 };
            Some((a.value, b.value, factor.clamp(0.0, 1.0)))
        }
        None => {
            let last = keys[keys.len() - 1].value;
            Some((last, last, 0.0))
        }
    }
}

/// Keyframes driving one bone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneChannel {
    pub positions: Vec<Keyframe<Vec3>>,
    pub rotations: Vec<Keyframe<Quat>>,
    pub scales: Vec<Keyframe<Vec3>>,
}

impl BoneChannel {
    /// Interpolated local transform; missing tracks fall back to the bind pose
    pub fn sample(&self, time: f32, bind_local: Mat4) -> Mat4 {
        let (bind_scale, bind_rotation, bind_translation) = bind_local.to_scale_rotation_translation();
        let translation = bracket(&self.positions, time)
            .map_or(bind_translation, |(a, b, t)| a.lerp(b, t));
        let rotation = bracket(&self.rotations, time)
            .map_or(bind_rotation, |(a, b, t)| a.slerp(b, t).normalize());
        let scale = bracket(&self.scales, time).map_or(bind_scale, |(a, b, t)| a.lerp(b, t));
        Mat4::from_scale_rotation_translation(scale, rotation, translation)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration_ticks: f32,
    pub ticks_per_second: f32,
    channels: HashMap<String, BoneChannel>,
}

impl AnimationClip {
    /// Used when a clip does not specify its tick rate
    pub const DEFAULT_TICKS_PER_SECOND: f32 = 25.0;

    pub fn new(name: impl Into<String>, duration_ticks: f32, ticks_per_second: f32) -> Self {
        let ticks_per_second = if ticks_per_second > 0.0 {
            ticks_per_second
        } else {
            Self::DEFAULT_TICKS_PER_SECOND
        };
        Self {
            name: name.into(),
            duration_ticks,
            ticks_per_second,
            channels: HashMap::new(),
        }
    }

    pub fn with_channel(mut self, bone: impl Into<String>, channel: BoneChannel) -> Self {
        self.channels.insert(bone.into(), channel);
        self
    }

    pub fn channel(&self, bone: &str) -> Option<&BoneChannel> {
        self.channels.get(bone)
    }

    /// Convert seconds to looping clip ticks
    pub fn ticks_at(&self, seconds: f32) -> f32 {
        let ticks = seconds * self.ticks_per_second;
        if self.duration_ticks > 0.0 {
            ticks.rem_euclid(self.duration_ticks)
        } else {
            0.0
        }
    }
}

/// Bone data of a skinned model
#[derive(Debug, Clone)]
pub struct Skinning {
    animation_data: Vec<AnimationData>,
    skeleton: Option<Skeleton>,
    clip: Option<AnimationClip>,
    bone_transforms: Vec<Mat4>,
    elapsed: f32,
}

impl Skinning {
    /// Static bone transforms with per-vertex influences
    pub fn new(animation_data: Vec<AnimationData>, bone_transforms: Vec<Mat4>) -> RendererResult<Self> {
        if bone_transforms.len() > MAX_NUM_BONES {
            return Err(RendererError::TooManyBones {
                count: bone_transforms.len(),
                max: MAX_NUM_BONES,
            });
        }
        Ok(Self {
            animation_data,
            skeleton: None,
            clip: None,
            bone_transforms,
            elapsed: 0.0,
        })
    }

    /// Bone transforms driven by `clip` over `skeleton`
    pub fn animated(
        animation_data: Vec<AnimationData>,
        skeleton: Skeleton,
        clip: Option<AnimationClip>,
    ) -> RendererResult<Self> {
        if skeleton.len() > MAX_NUM_BONES {
            return Err(RendererError::TooManyBones {
                count: skeleton.len(),
                max: MAX_NUM_BONES,
            });
        }
        let mut skinning = Self {
            animation_data,
            skeleton: Some(skeleton),
            clip,
            bone_transforms: Vec::new(),
            elapsed: 0.0,
        };
        skinning.evaluate();
        Ok(skinning)
    }

    pub fn update(&mut self, delta_time: f32) {
        if self.skeleton.is_none() {
            return;
        }
        self.elapsed += delta_time;
        self.evaluate();
    }

    fn evaluate(&mut self) {
        let Some(skeleton) = &self.skeleton else {
            return;
        };
        let clip = self.clip.as_ref();
        let ticks = clip.map_or(0.0, |clip| clip.ticks_at(self.elapsed));
        self.bone_transforms = skeleton.pose(|_, bone| {
            clip.and_then(|clip| clip.channel(&bone.name))
                .map_or(bone.bind_local, |channel| channel.sample(ticks, bone.bind_local))
        });
    }

    pub fn animation_data(&self) -> &[AnimationData] {
        &self.animation_data
    }

    pub fn bone_transforms(&self) -> &[Mat4] {
        &self.bone_transforms
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        self.skeleton.as_ref()
    }

    pub fn clip(&self) -> Option<&AnimationClip> {
        self.clip.as_ref()
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bone_skeleton() -> Skeleton {
        let mut skeleton = Skeleton::new(Mat4::IDENTITY);
        let root = skeleton
            .add_bone("root", None, Mat4::IDENTITY, Mat4::from_translation(Vec3::X))
            .unwrap();
        skeleton
            .add_bone("child", Some(root), Mat4::IDENTITY, Mat4::from_translation(Vec3::Y))
            .unwrap();
        skeleton
    }

    #[test]
    fn test_parent_must_exist() {
        let mut skeleton = Skeleton::new(Mat4::IDENTITY);
        assert_eq!(skeleton.add_bone("orphan", Some(0), Mat4::IDENTITY, Mat4::IDENTITY), None);
        assert!(skeleton.is_empty());
    }

    #[test]
    fn test_bind_pose_accumulates_parents() {
        let skeleton = two_bone_skeleton();
        let pose = skeleton.pose(|_, bone| bone.bind_local);
        assert_eq!(pose[1].transform_point3(Vec3::ZERO), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_offset_and_global_inverse_are_applied() {
        let mut skeleton = Skeleton::new(Mat4::from_translation(-Vec3::Z));
        skeleton.add_bone(
            "bone",
            None,
            Mat4::from_scale(Vec3::splat(2.0)),
            Mat4::IDENTITY,
        );
        let pose = skeleton.pose(|_, bone| bone.bind_local);
        assert_eq!(pose[0].transform_point3(Vec3::X), Vec3::new(2.0, 0.0, -1.0));
    }

    #[test]
    fn test_channel_interpolates_between_keys() {
        let channel = BoneChannel {
            positions: vec![Keyframe::new(0.0, Vec3::ZERO), Keyframe::new(10.0, Vec3::X * 10.0)],
            rotations: vec![
                Keyframe::new(0.0, Quat::IDENTITY),
                Keyframe::new(10.0, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)),
            ],
            scales: Vec::new(),
        };
        let local = channel.sample(5.0, Mat4::IDENTITY);
        let (scale, rotation, translation) = local.to_scale_rotation_translation();
        assert!((translation - Vec3::X * 5.0).length() < 1e-4);
        assert!(rotation.angle_between(Quat::from_rotation_y(std::f32::consts::FRAC_PI_4)) < 1e-3);
        assert!((scale - Vec3::ONE).length() < 1e-4);
    }

    #[test]
    fn test_clip_loops() {
        let clip = AnimationClip::new("walk", 20.0, 10.0);
        assert!((clip.ticks_at(3.0) - 10.0).abs() < 1e-4);
        assert_eq!(AnimationClip::new("idle", 5.0, 0.0).ticks_per_second, 25.0);
    }

    #[test]
    fn test_animated_skinning_advances() {
        let channel = BoneChannel {
            positions: vec![Keyframe::new(0.0, Vec3::ZERO), Keyframe::new(10.0, Vec3::Z * 10.0)],
            ..Default::default()
        };
        let clip = AnimationClip::new("slide", 10.0, 10.0).with_channel("root", channel);
        let mut skinning = Skinning::animated(Vec::new(), two_bone_skeleton(), Some(clip)).unwrap();
        assert_eq!(skinning.bone_transforms().len(), 2);

        skinning.update(0.5);
        let root = skinning.bone_transforms()[0].transform_point3(Vec3::ZERO);
        assert!((root - Vec3::Z * 5.0).length() < 1e-4);
    }

    #[test]
    fn test_too_many_bones() {
        let bones = vec![Mat4::IDENTITY; MAX_NUM_BONES + 1];
        assert!(matches!(
            Skinning::new(Vec::new(), bones),
            Err(RendererError::TooManyBones { count, .. }) if count == MAX_NUM_BONES + 1
        ));
    }
}
