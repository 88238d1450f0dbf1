use ndarray::{Array, Dimension, Zip};

use super::model::{LayerGrad, Mlp};

/// Adam with the usual defaults (beta1 0.9, beta2 0.999, epsilon 1e-7).
pub(crate) struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    step: i32,
    first_moment: Vec<LayerGrad>,
    second_moment: Vec<LayerGrad>,
}

impl Adam {
    pub(crate) fn new(model: &Mlp, learning_rate: f64) -> Self {
        let zeros: Vec<LayerGrad> = model.layers().iter().map(LayerGrad::zeros_like).collect();
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            step: 0,
            first_moment: zeros.clone(),
            second_moment: zeros,
        }
    }

    pub(crate) fn step(&mut self, model: &mut Mlp, grads: &[LayerGrad]) {
        self.step += 1;
        let hyper = Hyper {
            learning_rate: self.learning_rate,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            correction1: 1.0 - self.beta1.powi(self.step),
            correction2: 1.0 - self.beta2.powi(self.step),
        };

        let moments = self.first_moment.iter_mut().zip(self.second_moment.iter_mut());
        for ((layer, grad), (m, v)) in model.layers_mut().iter_mut().zip(grads).zip(moments) {
            hyper.update(&mut layer.weights, &grad.weights, &mut m.weights, &mut v.weights);
            hyper.update(&mut layer.bias, &grad.bias, &mut m.bias, &mut v.bias);
        }
    }
}

struct Hyper {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    correction1: f64,
    correction2: f64,
}

impl Hyper {
    fn update<D: Dimension>(
        &self,
        param: &mut Array<f64, D>,
        grad: &Array<f64, D>,
        m: &mut Array<f64, D>,
        v: &mut Array<f64, D>,
    ) {
        Zip::from(param)
            .and(grad)
            .and(m)
            .and(v)
            .for_each(|p, &g, m, v| {
                *m = self.beta1 * *m + (1.0 - self.beta1) * g;
                *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
                let m_hat = *m / self.correction1;
                let v_hat = *v / self.correction2;
                *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::utils::{cross_entropy, one_hot};
    use ndarray::array;

    #[test]
    fn test_steps_reduce_loss() {
        let mut model = Mlp::new(2, &[8], 2, 11).unwrap();
        let x = array![[1.0, 0.0], [0.0, 1.0], [0.9, 0.1], [0.1, 0.9]];
        let y = one_hot(&[0, 1, 0, 1], 2);
        let before = cross_entropy(&model.forward(x.view()), &y);

        let mut adam = Adam::new(&model, 0.01);
        for _ in 0..50 {
            let trace = model.forward_trace(x.view());
            let grads = model.backward(&trace, &y);
            adam.step(&mut model, &grads);
        }

        let after = cross_entropy(&model.forward(x.view()), &y);
        assert!(after < before, "loss did not decrease: {} -> {}", before, after);
    }
}
