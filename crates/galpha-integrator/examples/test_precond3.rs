use nalgebra::{DMatrix, DVector};

fn apply_preconditioner(j: &mut DMatrix<f64>, r: &mut DVector<f64>, n: usize, m: usize, scale: f64) {
    for i in 0..m {
        let row = n + i;
        for col in 0..j.ncols() {
            j[(row, col)] *= scale;
        }
        r[row] *= scale;
    }
    for i in 0..m {
        let col = n + i;
        for row in 0..j.nrows() {
            j[(row, col)] /= scale;
        }
    }
}

fn main() {
    // saddle point system: n=1 velocity dof, m=1 constraint
    // [ a  b ] [xv]   [r0]
    // [ c  d ] [xl] = [r1]
    let a = 5.0; let b = 2.0; let c = 3.0; let d = 0.1;
    let r0 = 1.0; let r1 = 2.0;
    let scale = 0.0005;

    // plain solve
    let j_plain = DMatrix::from_row_slice(2,2,&[a,b,c,d]);
    let mut rhs_plain = DVector::from_vec(vec![r0, r1]);
    let lu = j_plain.clone().lu();
    let x_plain = lu.solve(&rhs_plain).unwrap();
    println!("plain x = {:?}", x_plain);

    // preconditioned
    let mut j_pre = DMatrix::from_row_slice(2,2,&[a,b,c,d]);
    let mut r_pre = DVector::from_vec(vec![r0, r1]);
    apply_preconditioner(&mut j_pre, &mut r_pre, 1, 1, scale);
    let lu2 = j_pre.clone().lu();
    let y = lu2.solve(&r_pre).unwrap();
    println!("solved y (raw, no recovery) = {:?}", y);
    println!("recovered x with y_lambda/scale = {:?} {}", y[0], y[1]/scale);
    println!("recovered x with y_lambda*scale = {:?} {}", y[0], y[1]*scale);
}
