//! Class/role legality and party-composition checks.

use lfgproto::ids::{RoleMask, ROLE_DAMAGE, ROLE_HEAL, ROLE_MASK_NEEDED, ROLE_TANK};

use crate::host::Class;

/// A client can only offer roles its class can actually perform; anything
/// else is a malformed (or forged) request.
pub fn mask_invalid_for_class(class: Class, roles: RoleMask) -> bool {
    match class {
        Class::DeathKnight | Class::Warrior => roles.contains(ROLE_HEAL),
        Class::Warlock | Class::Mage | Class::Hunter | Class::Rogue => {
            roles.contains(ROLE_HEAL | ROLE_TANK)
        }
        Class::Priest | Class::Shaman => roles.contains(ROLE_TANK),
        Class::Paladin | Class::Druid => false,
    }
}

/// Can these role selections form a party of `num_tank` tanks, `num_heal`
/// healers and `num_dps` damage dealers?
///
/// Members offering all three roles can fill whatever is open and are
/// ignored. Single-role members consume their slot directly. Two-role
/// hybrids are binned and every split of the tank/heal hybrids across the
/// tank and heal slots is tried; a single witnessing assignment where the
/// leftover hybrids fit into the damage slots makes the set valid.
pub fn is_role_set_valid(
    masks: &[RoleMask],
    mut num_dps: u8,
    mut num_tank: u8,
    mut num_heal: u8,
) -> bool {
    if usize::from(num_dps) + usize::from(num_tank) + usize::from(num_heal) < masks.len() {
        return false;
    }

    const DPS_TANK: u8 = ROLE_DAMAGE | ROLE_TANK;
    const DPS_HEAL: u8 = ROLE_DAMAGE | ROLE_HEAL;
    const TANK_HEAL: u8 = ROLE_TANK | ROLE_HEAL;

    let mut dps_tank = 0u8;
    let mut dps_heal = 0u8;
    let mut tank_heal = 0u8;

    for mask in masks {
        match mask.needed() {
            ROLE_DAMAGE => {
                if num_dps == 0 {
                    return false;
                }
                num_dps -= 1;
            }
            ROLE_TANK => {
                if num_tank == 0 {
                    return false;
                }
                num_tank -= 1;
            }
            ROLE_HEAL => {
                if num_heal == 0 {
                    return false;
                }
                num_heal -= 1;
            }
            DPS_TANK => dps_tank += 1,
            DPS_HEAL => dps_heal += 1,
            TANK_HEAL => tank_heal += 1,
            ROLE_MASK_NEEDED => {}
            _ => return false,
        }
    }

    // Plainly impossible setups first.
    if num_dps + num_tank < dps_tank {
        return false;
    }
    if num_dps + num_heal < dps_heal {
        return false;
    }
    if num_tank + num_heal < tank_heal {
        return false;
    }

    // Try every split of the tank/heal hybrids: `t` of them tank, the rest
    // heal. Remaining hybrids spill into the damage slots.
    let max_tank_heal_as_tank = tank_heal.min(num_tank);
    for tank_heal_as_tank in 0..=max_tank_heal_as_tank {
        let dps_tank_as_tank = (num_tank - tank_heal_as_tank).min(dps_tank);

        let tank_heal_as_heal = tank_heal - tank_heal_as_tank;
        if num_heal < tank_heal_as_heal {
            continue;
        }
        let dps_heal_as_heal = (num_heal - tank_heal_as_heal).min(dps_heal);

        let dps_tank_as_dps = dps_tank - dps_tank_as_tank;
        let dps_heal_as_dps = dps_heal - dps_heal_as_heal;
        if dps_tank_as_dps + dps_heal_as_dps <= num_dps {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use lfgproto::ids::ROLE_LEADER;

    const T: RoleMask = RoleMask(ROLE_TANK);
    const H: RoleMask = RoleMask(ROLE_HEAL);
    const D: RoleMask = RoleMask(ROLE_DAMAGE);
    const TH: RoleMask = RoleMask(ROLE_TANK | ROLE_HEAL);
    const DT: RoleMask = RoleMask(ROLE_DAMAGE | ROLE_TANK);
    const DH: RoleMask = RoleMask(ROLE_DAMAGE | ROLE_HEAL);
    const ALL: RoleMask = RoleMask(ROLE_MASK_NEEDED);

    fn valid(masks: &[RoleMask]) -> bool {
        is_role_set_valid(masks, 3, 1, 1)
    }

    #[test]
    fn pure_selections_fit_when_counts_fit() {
        assert!(valid(&[T, H, D, D, D]));
        assert!(valid(&[T, H, D]));
        assert!(!valid(&[T, T]), "two tanks cannot share one slot");
        assert!(!valid(&[H, H]));
        assert!(!valid(&[D, D, D, D]));
    }

    #[test]
    fn all_three_members_never_break_a_valid_set() {
        assert!(valid(&[T, H, D, D, ALL]));
        assert!(valid(&[ALL, ALL, ALL, ALL, ALL]));
        assert!(valid(&[T, H, D, ALL]));
    }

    #[test]
    fn leader_bit_does_not_change_composition() {
        assert!(valid(&[RoleMask(ROLE_LEADER | ROLE_TANK), H, D, D, D]));
    }

    #[test]
    fn hybrids_are_split_across_open_slots() {
        assert!(valid(&[TH, DT, D, D, D]));
        assert!(valid(&[TH, TH, D, D, D]));
        assert!(valid(&[DT, DH, D, D, D]));
        assert!(valid(&[DT, DT, DT, DT, H]));
    }

    #[test]
    fn oversized_or_empty_selections_are_invalid() {
        assert!(!valid(&[D, D, D, D, D, D]));
        assert!(!valid(&[RoleMask::EMPTY, D]));
        assert!(!valid(&[RoleMask(ROLE_LEADER), D]));
    }

    #[test]
    fn validity_is_order_independent() {
        let base = [TH, DT, D, H, ALL];
        let expected = valid(&base);
        let mut rotated = base;
        for _ in 0..base.len() {
            rotated.rotate_left(1);
            assert_eq!(valid(&rotated), expected);
        }
        let mut reversed = base;
        reversed.reverse();
        assert_eq!(valid(&reversed), expected);
    }

    #[test]
    fn class_restrictions_block_impossible_roles() {
        assert!(mask_invalid_for_class(Class::Warrior, H));
        assert!(mask_invalid_for_class(Class::DeathKnight, DH));
        assert!(!mask_invalid_for_class(Class::Warrior, DT));
        assert!(mask_invalid_for_class(Class::Mage, T));
        assert!(mask_invalid_for_class(Class::Rogue, H));
        assert!(!mask_invalid_for_class(Class::Hunter, D));
        assert!(mask_invalid_for_class(Class::Priest, T));
        assert!(!mask_invalid_for_class(Class::Shaman, DH));
        assert!(!mask_invalid_for_class(Class::Druid, ALL));
        assert!(!mask_invalid_for_class(Class::Paladin, ALL));
    }
}
