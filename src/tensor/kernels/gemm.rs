/// General Matrix Multiply (GEMM) operations
///
/// Internal core GEMM operation using explicit strides
/// Computes: C += alpha * A @ B
///
/// A matrix of shape `[rows, cols]` stored first-axis-fastest has
/// `row_stride = 1` and `col_stride = rows`; swapping the two strides reads
/// the same buffer as its transpose.
struct GemmParams<'a> {
    a_data: &'a [f64],
    m: usize,
    k: usize,
    a_row_stride: usize,
    a_col_stride: usize,
    b_data: &'a [f64],
    n: usize,
    b_row_stride: usize,
    b_col_stride: usize,
    c_data: &'a mut [f64],
    alpha: f64,
}

fn gemm_core(params: GemmParams) {
    let GemmParams {
        a_data,
        m,
        k,
        a_row_stride,
        a_col_stride,
        b_data,
        n,
        b_row_stride,
        b_col_stride,
        c_data,
        alpha,
    } = params;

    debug_assert_eq!(c_data.len(), m * n, "Output buffer size mismatch");

    // Output is written first-axis-fastest: C[i, j] lives at i + m * j
    for j in 0..n {
        for i in 0..m {
            let mut sum = 0.0;
            for p in 0..k {
                let a_idx = i * a_row_stride + p * a_col_stride;
                let b_idx = p * b_row_stride + j * b_col_stride;
                sum += a_data[a_idx] * b_data[b_idx];
            }
            c_data[i + m * j] += alpha * sum;
        }
    }
}

/// Performs matrix multiplication: C = A @ B
///
/// # Arguments
/// * `a_data` - Flattened data of matrix A
/// * `a_dims` - Shape of matrix A as [rows, cols]
/// * `b_data` - Flattened data of matrix B
/// * `b_dims` - Shape of matrix B as [rows, cols]
///
/// Callers validate that `a_dims[1] == b_dims[0]`.
///
/// # Returns
/// * Flattened result matrix C with shape [a_dims[0], b_dims[1]]
pub fn matmul(a_data: &[f64], a_dims: [usize; 2], b_data: &[f64], b_dims: [usize; 2]) -> Vec<f64> {
    let [m, k] = a_dims;
    let n = b_dims[1];
    let mut result = vec![0.0; m * n];

    gemm_core(GemmParams {
        a_data,
        m,
        k,
        a_row_stride: 1,
        a_col_stride: m,
        b_data,
        n,
        b_row_stride: 1,
        b_col_stride: b_dims[0],
        c_data: &mut result,
        alpha: 1.0,
    });

    result
}

/// Copies a `[rows, cols]` matrix into a new `[cols, rows]` buffer
pub fn transpose(data: &[f64], dims: [usize; 2]) -> Vec<f64> {
    let [rows, cols] = dims;
    let mut result = vec![0.0; rows * cols];
    for j in 0..cols {
        for i in 0..rows {
            // (i, j) in the source becomes (j, i) in a [cols, rows] target
            result[j + cols * i] = data[i + rows * j];
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matmul_basic() {
        // A = [[1, 2, 3],
        //      [4, 5, 6]]  stored column by column
        let a = vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0];
        // B = [[1, 2],
        //      [3, 4],
        //      [5, 6]]
        let b = vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0];

        let result = matmul(&a, [2, 3], &b, [3, 2]);

        // [[22, 28],
        //  [49, 64]]
        assert_eq!(result, vec![22.0, 49.0, 28.0, 64.0]);
    }

    #[test]
    fn test_matmul_identity() {
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let identity = vec![1.0, 0.0, 0.0, 1.0];

        let result = matmul(&a, [2, 2], &identity, [2, 2]);
        assert_eq!(result, a);
    }

    #[test]
    fn test_matmul_row_times_column() {
        let row = vec![1.0, 2.0, 3.0];
        let col = vec![4.0, 5.0, 6.0];
        assert_eq!(matmul(&row, [1, 3], &col, [3, 1]), vec![32.0]);
    }

    #[test]
    fn test_transpose() {
        // [[1, 2, 3],
        //  [4, 5, 6]]
        let a = vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0];
        // [[1, 4],
        //  [2, 5],
        //  [3, 6]]
        assert_eq!(transpose(&a, [2, 3]), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }
}
