//! Tiny dense least squares for the linear half of the separable fits.

/// most linear unknowns any model needs
pub const MAX_COLS:usize = 3;

/// least-squares solution of `sum_j c[j]*cols[j] ~= y` through the normal
/// equations. Returns the coefficients and the residual sum of squares, or None
/// if the columns are (numerically) dependent.
pub fn least_squares(cols:&[&[f64]],y:&[f64]) -> Option<([f64;MAX_COLS],f64)> {
    let n = cols.len();
    if n == 0 || n > MAX_COLS || cols.iter().any(|c| c.len() != y.len()) {
        return None;
    }
    let mut a = [[0.0f64;MAX_COLS];MAX_COLS];
    let mut b = [0.0f64;MAX_COLS];
    for i in 0..n {
        for j in i..n {
            let v:f64 = cols[i].iter().zip(cols[j].iter()).map(|(p,q)| p*q).sum();
            a[i][j] = v;
            a[j][i] = v;
        }
        b[i] = cols[i].iter().zip(y.iter()).map(|(p,q)| p*q).sum();
    }
    let scale = (0..n).map(|i| a[i][i]).fold(0.0f64,f64::max);
    if !(scale > 0.0) {
        return None;
    }

    // gaussian elimination with partial pivoting
    for col in 0..n {
        let pivot = (col..n).max_by(|&p,&q| a[p][col].abs().total_cmp(&a[q][col].abs()))?;
        if a[pivot][col].abs() <= scale*1e-13 {
            return None;
        }
        a.swap(col,pivot);
        b.swap(col,pivot);
        for row in col+1..n {
            let f = a[row][col]/a[col][col];
            for k in col..n {
                a[row][k] -= f*a[col][k];
            }
            b[row] -= f*b[col];
        }
    }
    let mut c = [0.0f64;MAX_COLS];
    for row in (0..n).rev() {
        let s:f64 = (row+1..n).map(|k| a[row][k]*c[k]).sum();
        c[row] = (b[row] - s)/a[row][row];
    }

    let rss:f64 = y.iter().enumerate().map(|(i,yi)| {
        let model:f64 = (0..n).map(|j| c[j]*cols[j][i]).sum();
        (yi - model).powi(2)
    }).sum();
    Some((c,rss))
}
