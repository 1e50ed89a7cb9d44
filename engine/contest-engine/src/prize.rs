//! Prize distribution curve
//!
//! Maps a prize pool and field size to per-rank payouts. Every payout is
//! floored to the cent, so the payouts never add up to more than the pool;
//! the unallocated remainder stays with the house.

use rust_decimal::Decimal;
use wallet_ledger::Money;

/// Fraction of the field that is paid in large contests
const LARGE_FIELD_PAID_PERCENT: usize = 20;

/// Per-rank payouts, highest rank first
///
/// The result has one element per paid rank. Ranks beyond its length win
/// nothing. A non-positive pool pays zero to every paid rank.
pub fn curve(total_prize: Money, participants: usize) -> Vec<Money> {
    let shares: Vec<Decimal> = match participants {
        0 => return Vec::new(),
        1 => vec![Decimal::ONE],
        2 => vec![Decimal::new(70, 2), Decimal::new(30, 2)],
        3..=5 => vec![Decimal::new(50, 2), Decimal::new(30, 2), Decimal::new(20, 2)],
        6..=10 => vec![
            Decimal::new(40, 2),
            Decimal::new(25, 2),
            Decimal::new(15, 2),
            Decimal::new(10, 2),
            Decimal::new(10, 2),
        ],
        _ => return large_field(total_prize, participants),
    };

    if !total_prize.is_positive() {
        return vec![Money::ZERO; shares.len()];
    }

    let pool = total_prize.to_decimal();
    shares.iter().map(|share| Money::from_decimal_floor(pool * share)).collect()
}

/// Top fifth of the field is paid: the winner gets twice the even split,
/// second place one and a half times, everyone else 0.8 times. When that
/// overshoots the pool, everything is scaled down proportionally.
fn large_field(total_prize: Money, participants: usize) -> Vec<Money> {
    let winners = (participants * LARGE_FIELD_PAID_PERCENT).div_ceil(100);
    if !total_prize.is_positive() {
        return vec![Money::ZERO; winners];
    }

    let pool = total_prize.to_decimal();
    let base = pool / Decimal::from(winners as u64);
    let raw: Vec<Decimal> = (0..winners)
        .map(|rank| {
            let multiplier = match rank {
                0 => Decimal::from(2),
                1 => Decimal::new(15, 1),
                _ => Decimal::new(8, 1),
            };
            base * multiplier
        })
        .collect();

    let raw_total: Decimal = raw.iter().sum();
    let mut payouts: Vec<Money> = if raw_total > pool {
        let factor = pool / raw_total;
        raw.iter().map(|amount| Money::from_decimal_floor(*amount * factor)).collect()
    } else {
        raw.iter().map(|amount| Money::from_decimal_floor(*amount)).collect()
    };

    trim_to_pool(&mut payouts, total_prize);
    payouts
}

/// Division in `Decimal` rounds at its last digit; take back any stray cent
/// from the lowest ranks so the payouts stay within the pool.
fn trim_to_pool(payouts: &mut [Money], pool: Money) {
    let mut excess = payouts.iter().sum::<Money>() - pool;
    for payout in payouts.iter_mut().rev() {
        if !excess.is_positive() {
            break;
        }
        let take = Money::from_cents(excess.cents().min(payout.cents()));
        *payout -= take;
        excess -= take;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dollars(amounts: &[&str]) -> Vec<Money> {
        amounts
            .iter()
            .map(|amount| Money::from_decimal_floor(amount.parse::<Decimal>().unwrap()))
            .collect()
    }

    #[test]
    fn test_small_fields() {
        assert!(curve(Money::from_dollars(100), 0).is_empty());
        assert_eq!(curve(Money::from_dollars(100), 1), dollars(&["100"]));
        assert_eq!(curve(Money::from_dollars(100_000), 2), dollars(&["70000", "30000"]));
        assert_eq!(curve(Money::from_dollars(200), 4), dollars(&["100", "60", "40"]));
        assert_eq!(curve(Money::from_dollars(1000), 8), dollars(&["400", "250", "150", "100", "100"]));
    }

    #[test]
    fn test_two_entrants_split_eighteen_dollars() {
        assert_eq!(curve(Money::from_dollars(18), 2), dollars(&["12.60", "5.40"]));
    }

    #[test]
    fn test_payouts_floor_to_the_cent() {
        let payouts = curve(Money::from_cents(1001), 3);
        assert_eq!(payouts, vec![Money::from_cents(500), Money::from_cents(300), Money::from_cents(200)]);
    }

    #[test]
    fn test_large_field_pays_top_fifth() {
        let payouts = curve(Money::from_dollars(1000), 20);
        assert_eq!(payouts.len(), 4);
        // base 250: raw 500 + 375 + 200 + 200 = 1275, scaled by 1000/1275
        assert_eq!(payouts[0], Money::from_cents(39215));
        assert_eq!(payouts[1], Money::from_cents(29411));
        assert_eq!(payouts[2], Money::from_cents(15686));
        assert_eq!(payouts[3], Money::from_cents(15686));
        assert!(payouts.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn test_large_field_rounds_winner_count_up() {
        assert_eq!(curve(Money::from_dollars(100), 11).len(), 3);
        assert_eq!(curve(Money::from_dollars(100), 26).len(), 6);
    }

    #[test]
    fn test_empty_pool_pays_zero() {
        assert_eq!(curve(Money::ZERO, 3), vec![Money::ZERO; 3]);
        assert_eq!(curve(Money::from_cents(-500), 2), vec![Money::ZERO; 2]);
        assert_eq!(curve(Money::ZERO, 50), vec![Money::ZERO; 10]);
    }

    #[test]
    fn test_payouts_never_exceed_pool() {
        let pools = [0, 1, 7, 99, 1_001, 1_800, 33_333, 1_000_000, 123_456_789];
        for cents in pools {
            for participants in 0..=120 {
                let pool = Money::from_cents(cents);
                let payouts = curve(pool, participants);
                let total: Money = payouts.iter().sum();
                assert!(
                    total <= pool.max(Money::ZERO),
                    "{participants} entrants over {pool} paid {total}"
                );
                assert!(payouts.iter().all(|payout| !payout.is_negative()));
            }
        }
    }
}
