use crate::models::DieFace;

/// Points for one column. A face that appears once counts its value; a face
/// that appears `k > 1` times counts `face * k * k`.
pub fn score(column: &[DieFace]) -> u32 {
    let mut counts = [0u32; 7];
    for face in column {
        counts[usize::from(face.value())] += 1;
    }
    let mut total = 0;
    for (face, &k) in counts.iter().enumerate().skip(1) {
        let face = face as u32;
        total += match k {
            0 => 0,
            1 => face,
            _ => face * k * k,
        };
    }
    total
}
