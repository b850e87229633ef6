//! Encrypted-value arithmetic capability

use crate::{Ciphertext, EncryptedBool, Handle};

/// Arithmetic, comparison and selection over encrypted u32 values
///
/// Backends must agree on these semantics so that a plaintext shadow run
/// predicts exactly what the encrypted run decrypts to:
/// - `add`, `sub`, `mul` wrap modulo 2^32
/// - `div` by an encrypted zero yields `u32::MAX`, never a trap
/// - `abs` reads its operand as two's-complement i32 and returns the magnitude
/// - `gt`, `lt` compare unsigned
///
/// Operations are synchronous and cannot fail. A handle the backend does not
/// recognise behaves as an encryption of zero. Every operation other than
/// `constant` returns a fresh handle that no other caller holds.
pub trait EncryptedAlu: Send + Sync {
    /// Trivial encryption of a public constant
    fn constant(&self, value: u32) -> Ciphertext;

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext;

    fn sub(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext;

    fn mul(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext;

    fn div(&self, a: &Ciphertext, b: &Ciphertext) -> Ciphertext;

    fn abs(&self, a: &Ciphertext) -> Ciphertext;

    fn gt(&self, a: &Ciphertext, b: &Ciphertext) -> EncryptedBool;

    fn lt(&self, a: &Ciphertext, b: &Ciphertext) -> EncryptedBool;

    fn and(&self, a: &EncryptedBool, b: &EncryptedBool) -> EncryptedBool;

    fn or(&self, a: &EncryptedBool, b: &EncryptedBool) -> EncryptedBool;

    /// `cond ? if_true : if_false`, without revealing which branch was taken
    fn select(&self, cond: &EncryptedBool, if_true: &Ciphertext, if_false: &Ciphertext) -> Ciphertext;

    /// Drop ciphertexts nobody will read again
    ///
    /// Released handles afterwards read as an encryption of zero. Handles
    /// returned by `constant` may be shared and are left alone.
    fn release(&self, _handles: &[Handle]) {}

    /// `a + value` for a public `value`
    fn add_scalar(&self, a: &Ciphertext, value: u32) -> Ciphertext {
        self.add(a, &self.constant(value))
    }

    /// `a * value` for a public `value`
    fn mul_scalar(&self, a: &Ciphertext, value: u32) -> Ciphertext {
        self.mul(a, &self.constant(value))
    }

    /// `a / value` for a public `value`
    fn div_scalar(&self, a: &Ciphertext, value: u32) -> Ciphertext {
        self.div(a, &self.constant(value))
    }

    /// `value - a` for a public `value`
    fn scalar_sub(&self, value: u32, a: &Ciphertext) -> Ciphertext {
        self.sub(&self.constant(value), a)
    }

    /// `a > value` for a public `value`
    fn gt_scalar(&self, a: &Ciphertext, value: u32) -> EncryptedBool {
        self.gt(a, &self.constant(value))
    }

    /// `a < value` for a public `value`
    fn lt_scalar(&self, a: &Ciphertext, value: u32) -> EncryptedBool {
        self.lt(a, &self.constant(value))
    }
}
