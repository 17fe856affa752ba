//! Particle deposition onto uniform meshes.
//!
//! Deposition turns per-particle values into per-cell mesh values. Every
//! particle type gets a `("deposit", "<type>_count")` field; types carrying
//! `particle_mass` additionally get nearest-cell mass (`_mass`) and
//! cloud-in-cell mass (`_cic`) fields.

use crate::fields::{FieldInfo, FieldKey, FieldKind, FieldRegistry};

/// Field type under which deposition fields are registered.
pub const DEPOSIT_FTYPE: &str = "deposit";

/// How particle values are scattered into mesh cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepositMethod {
    /// Particle count per cell.
    Count,
    /// Mass summed into the nearest cell.
    Ngp,
    /// Mass distributed over the eight nearest cells by trilinear weights.
    Cic,
}

impl DepositMethod {
    pub const ALL: [DepositMethod; 3] = [DepositMethod::Count, DepositMethod::Ngp, DepositMethod::Cic];

    /// Suffix used in deposition field names, e.g. `stars_cic`.
    pub fn suffix(self) -> &'static str {
        match self {
            DepositMethod::Count => "count",
            DepositMethod::Ngp => "mass",
            DepositMethod::Cic => "cic",
        }
    }

    /// Whether the method weights particles by `particle_mass`.
    pub fn requires_mass(self) -> bool {
        !matches!(self, DepositMethod::Count)
    }
}

/// Registry key of a deposition field, e.g. `("deposit", "stars_cic")`.
pub fn deposit_field_key(ptype: &str, method: DepositMethod) -> FieldKey {
    FieldKey::new(DEPOSIT_FTYPE, format!("{}_{}", ptype, method.suffix()))
}

/// Register the deposition fields for `ptype`. Mass-weighted methods are
/// skipped when the type carries no `particle_mass` field.
pub(crate) fn register_deposit_fields(registry: &mut FieldRegistry, ptype: &str) {
    let has_mass = registry.contains(&FieldKey::new(ptype, "particle_mass"));
    for method in DepositMethod::ALL {
        if method.requires_mass() && !has_mass {
            continue;
        }
        registry.insert(FieldInfo::new(
            deposit_field_key(ptype, method),
            FieldKind::Deposit {
                source_type: ptype.to_string(),
                method,
            },
        ));
    }
}

/// Scatter particles into a row-major `dims` mesh anchored at `left_edge`.
///
/// `weights` is `None` for counts and per-particle masses otherwise. Particles
/// sitting exactly on the right face are folded into the last cell, so the
/// deposited total always equals the particle count (or total mass).
pub(crate) fn deposit(
    method: DepositMethod,
    px: &[f64],
    py: &[f64],
    pz: &[f64],
    weights: Option<&[f64]>,
    left_edge: [f64; 3],
    dims: [usize; 3],
    cell_width: [f64; 3],
) -> Vec<f64> {
    debug_assert_eq!(px.len(), py.len());
    debug_assert_eq!(px.len(), pz.len());
    let [nx, ny, nz] = dims;
    let mut mesh = vec![0.0; nx * ny * nz];

    for i in 0..px.len() {
        let w = weights.map_or(1.0, |ws| ws[i]);
        let p = [px[i], py[i], pz[i]];
        match method {
            DepositMethod::Count | DepositMethod::Ngp => {
                let ix = nearest_cell(p[0], left_edge[0], cell_width[0], nx);
                let iy = nearest_cell(p[1], left_edge[1], cell_width[1], ny);
                let iz = nearest_cell(p[2], left_edge[2], cell_width[2], nz);
                mesh[flat_index(ix, iy, iz, dims)] += w;
            }
            DepositMethod::Cic => {
                let wx = cic_axis(p[0], left_edge[0], cell_width[0], nx);
                let wy = cic_axis(p[1], left_edge[1], cell_width[1], ny);
                let wz = cic_axis(p[2], left_edge[2], cell_width[2], nz);
                for (ix, fx) in wx {
                    for (iy, fy) in wy {
                        for (iz, fz) in wz {
                            mesh[flat_index(ix, iy, iz, dims)] += w * fx * fy * fz;
                        }
                    }
                }
            }
        }
    }
    mesh
}

fn flat_index(ix: usize, iy: usize, iz: usize, dims: [usize; 3]) -> usize {
    (ix * dims[1] + iy) * dims[2] + iz
}

/// Index of the cell containing `p`, clamped onto the mesh.
fn nearest_cell(p: f64, left: f64, width: f64, n: usize) -> usize {
    let idx = ((p - left) / width).floor() as isize;
    idx.clamp(0, n as isize - 1) as usize
}

/// The two cells along one axis a particle contributes to under
/// cloud-in-cell, with their weights. Cell centers sit at
/// `left + (i + 0.5) * width`; boundary contributions fold back onto the
/// edge cells so the axis weights always sum to one.
fn cic_axis(p: f64, left: f64, width: f64, n: usize) -> [(usize, f64); 2] {
    let x = (p - left) / width - 0.5;
    let base = x.floor();
    let frac = x - base;
    let lo = (base as isize).clamp(0, n as isize - 1) as usize;
    let hi = (base as isize + 1).clamp(0, n as isize - 1) as usize;
    [(lo, 1.0 - frac), (hi, frac)]
}
