//! GEMM kernels used by the drivers.
//!
//! Both kernels compute `C = alpha * A * B + beta * C` over strided row-major views:
//! - `gemm_naive`: a simple, safe triple loop (reference semantics)
//! - `gemm_blocked`: the `matrixmultiply` backend (feature `matrixmultiply`)
//!
//! Shapes and bounds are validated by the driver before either kernel is called.

/// Row-streaming reference kernel: each row of `C` is scaled by `beta`, then gets
/// `alpha * A[i][p] * B[p][..]` added for every `p`. The inner loop walks a row of `B`
/// and a row of `C`, which are contiguous for row-major operands.
///
/// `beta == 0` overwrites `C` without reading it, as BLAS does.
#[allow(clippy::too_many_arguments)]
pub(crate) fn gemm_naive(
    m: usize,
    n: usize,
    k: usize,
    alpha: f64,
    a: &[f64],
    rsa: usize,
    csa: usize,
    b: &[f64],
    rsb: usize,
    csb: usize,
    beta: f64,
    c: &mut [f64],
    rsc: usize,
    csc: usize,
) {
    debug_assert!(m > 0 && n > 0 && k > 0);
    debug_assert!(a.len() >= (m - 1) * rsa + (k - 1) * csa + 1);
    debug_assert!(b.len() >= (k - 1) * rsb + (n - 1) * csb + 1);
    debug_assert!(c.len() >= (m - 1) * rsc + (n - 1) * csc + 1);

    for i in 0..m {
        let c_row = i * rsc;
        for j in 0..n {
            let cij = &mut c[c_row + j * csc];
            *cij = if beta == 0.0 { 0.0 } else { beta * *cij };
        }

        for p in 0..k {
            let scale = alpha * a[i * rsa + p * csa];
            let b_row = p * rsb;
            for j in 0..n {
                c[c_row + j * csc] += scale * b[b_row + j * csb];
            }
        }
    }
}

#[cfg(feature = "matrixmultiply")]
#[allow(clippy::too_many_arguments)]
#[inline]
pub(crate) fn gemm_blocked(
    m: usize,
    n: usize,
    k: usize,
    alpha: f64,
    a: &[f64],
    rsa: usize,
    csa: usize,
    b: &[f64],
    rsb: usize,
    csb: usize,
    beta: f64,
    c: &mut [f64],
    rsc: usize,
    csc: usize,
) {
    assert!(a.len() >= (m - 1) * rsa + (k - 1) * csa + 1, "lhs buffer too short");
    assert!(b.len() >= (k - 1) * rsb + (n - 1) * csb + 1, "rhs buffer too short");
    assert!(c.len() >= (m - 1) * rsc + (n - 1) * csc + 1, "out buffer too short");

    // SAFETY: the asserts above keep every strided access inside the three buffers,
    // and `c` is uniquely borrowed for the duration of the call.
    unsafe {
        matrixmultiply::dgemm(
            m,
            k,
            n,
            alpha,
            a.as_ptr(),
            rsa as isize,
            csa as isize,
            b.as_ptr(),
            rsb as isize,
            csb as isize,
            beta,
            c.as_mut_ptr(),
            rsc as isize,
            csc as isize,
        );
    }
}
