//! Perceptual frame hashing.
//!
//! Frames from two encodes of the same content rarely match pixel for
//! pixel, so frame identity is decided on gradient hashes and a hamming
//! distance threshold.

use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig, ImageHash};

/// Gradient (dHash-style) hash of a frame.
pub fn compute_hash(image: &DynamicImage, hash_size: u8) -> ImageHash {
    HasherConfig::new()
        .hash_alg(HashAlg::Gradient)
        .hash_size(hash_size as u32, hash_size as u32)
        .to_hasher()
        .hash_image(image)
}

/// Hamming distance between two hashes.
pub fn hash_distance(a: &ImageHash, b: &ImageHash) -> u32 {
    a.dist(b)
}

/// Whether two frames show the same picture.
pub fn frames_match(a: &DynamicImage, b: &DynamicImage, hash_size: u8, threshold: u32) -> bool {
    hash_distance(&compute_hash(a, hash_size), &compute_hash(b, hash_size)) <= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::scene_image;

    #[test]
    fn identical_frames_match() {
        let a = scene_image(1);
        assert_eq!(hash_distance(&compute_hash(&a, 8), &compute_hash(&a, 8)), 0);
        assert!(frames_match(&a, &a.clone(), 8, 0));
    }

    #[test]
    fn different_scenes_do_not_match() {
        assert!(!frames_match(&scene_image(1), &scene_image(2), 8, 12));
    }
}
